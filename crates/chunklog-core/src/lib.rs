//! Core data model for the chunklog storage engine.
//!
//! This crate holds the pure, I/O-free pieces shared by every part of the
//! engine:
//!
//! - **Chunk geometry** ([`ChunkLayout`]): how a byte position in a logical
//!   stream maps onto fixed-size chunks.
//! - **Chunk identity** ([`ChunkKey`]): the `(stream_id, chunk_index)` pair
//!   that names a chunk across every backing store.
//! - **Tier classification** ([`Tier`]): hot, durable, and archival storage
//!   classes and what each one is allowed to do.
//!
//! Everything here is arithmetic and naming. The backends, the router, and
//! the stream I/O live in `chunklog-storage`.

pub mod error;
pub mod key;
pub mod layout;
pub mod tier;

pub use error::{Error, Result};
pub use key::ChunkKey;
pub use layout::{ChunkLayout, DEFAULT_CHUNK_SIZE};
pub use tier::Tier;
