//! Chunklog Storage Engine
//!
//! This crate implements a chunked append-only log storage engine: one
//! logical byte stream per job, stored as fixed-size chunks spread across a
//! hot tier (in-memory cache), a durable tier (SQLite row store), and an
//! optional archival tier (ranged HTTP reads).
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  append   ┌───────────────┐
//! │   Ingestion  │ ────────→ │ ChunkedStream │ ←── exclusive write lease
//! └──────────────┘           └───────┬───────┘
//!                                    │ chunk-sized segments
//!                                    ▼
//!                            ┌───────────────┐
//!                            │  ChunkRouter  │  tier = f(index, count)
//!                            └───┬───────┬───┘
//!                  last chunk    │       │    completed chunks
//!                                ▼       ▼
//!                         ┌─────────┐ ┌─────────┐ ┌──────────┐
//!                         │   hot   │ │ durable │ │ archival │
//!                         │ (cache) │ │ (rows)  │ │ (ranged  │
//!                         └─────────┘ └─────────┘ │   HTTP)  │
//!                                                 └──────────┘
//! ```
//!
//! The actively-written (last) chunk lives in the hot tier. When it fills
//! and the next chunk opens, it is promoted to the durable tier. Truncation
//! runs the move in reverse: a durable boundary chunk is demoted back to
//! the hot tier, the only tier that can cut a chunk in place. Frozen
//! streams are read straight from the archival tier with HTTP range
//! requests.
//!
//! ## Main Components
//!
//! - [`ChunkStorage`]: entry point; opens streams and destroys them.
//! - [`ChunkedStream`]: read/write/seek/truncate over global stream offsets.
//! - [`ChunkRouter`]: pure tier selection plus promotion/demotion.
//! - [`ChunkBackend`]: the per-tier storage contract, with hot, durable,
//!   and archival implementations.
//! - [`LeaseStore`]: at-most-one-writer arbitration with TTL self-healing.
//!
//! ## Usage Example
//!
//! ```ignore
//! use chunklog_storage::{ChunkStorage, StorageConfig};
//!
//! let storage = ChunkStorage::from_config(StorageConfig::default()).await?;
//!
//! // Ingestion: exclusive append
//! let mut stream = storage.open_append(job_id, 0).await?;
//! stream.write(b"Running on runner-7f3a, executor docker\n").await?;
//! let size = stream.close().await?;
//!
//! // Viewing: lock-free reads
//! let mut stream = storage.open_read(job_id, size).await?;
//! let line = stream.read_line().await?;
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod lease;
pub mod manager;
pub mod router;
pub mod stream;

pub use backend::{ArchivalTierBackend, ChunkBackend, DurableTierBackend, HotTierBackend};
pub use config::StorageConfig;
pub use error::{Error, Result};
pub use lease::{InMemoryLeaseStore, LeaseStore, WriteLease};
pub use manager::ChunkStorage;
pub use router::ChunkRouter;
pub use stream::{ChunkedStream, OpenMode};
