//! Chunk Store Backends
//!
//! Each backend stores individual fixed-size chunks of logical streams,
//! addressed by [`ChunkKey`]. Three implementations cover the three tiers:
//!
//! - [`HotTierBackend`]: in-memory keyed store for the actively-written
//!   chunk. Supports every mutation, including in-place truncation.
//! - [`DurableTierBackend`]: SQLite row store for completed chunks. Rows
//!   carry a CRC32 checksum verified on read.
//! - [`ArchivalTierBackend`]: read-only ranged HTTP reads for frozen
//!   streams.
//!
//! Backends are injected into the router as `Arc<dyn ChunkBackend>`; nothing
//! in the engine names a concrete backend type.

pub mod archival;
pub mod durable;
pub mod hot;

pub use archival::ArchivalTierBackend;
pub use durable::DurableTierBackend;
pub use hot::HotTierBackend;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chunklog_core::{ChunkKey, Tier};

/// Storage contract for a single chunk in a single tier.
///
/// All methods take the chunk key per call; connection and buffer lifetimes
/// are managed inside the implementation (pool, client), so there is no
/// separate open/close handshake to get wrong.
#[async_trait]
pub trait ChunkBackend: std::fmt::Debug + Send + Sync + 'static {
    /// Tier this backend implements.
    fn tier(&self) -> Tier;

    /// Full current chunk content.
    ///
    /// Fails with `ChunkNotFound` if this backend has no such chunk.
    async fn get(&self, key: ChunkKey) -> Result<Bytes>;

    /// Byte length of the stored chunk content; `0` if absent.
    async fn size(&self, key: ChunkKey) -> Result<u64>;

    /// Overwrite the chunk content entirely; returns bytes written.
    ///
    /// Empty input is a `Write` error: the engine never needs to store zero
    /// bytes, so an empty write always signals a caller bug.
    async fn write(&self, key: ChunkKey, data: Bytes) -> Result<u64>;

    /// Append to existing chunk content; returns bytes appended.
    ///
    /// Fails with a `Write` error if the chunk does not exist yet (`write`
    /// creates chunks) or if the post-append length disagrees with the
    /// caller-computed `expected_len`, which flags a lost update from a
    /// competing writer.
    async fn append(&self, key: ChunkKey, data: Bytes, expected_len: u64) -> Result<u64>;

    /// Cut the chunk content down to `len` bytes.
    ///
    /// Only tiers that allow partial rewrite support this; the others fail
    /// and must be deleted wholesale instead.
    async fn truncate(&self, key: ChunkKey, len: u64) -> Result<()>;

    /// Remove the chunk from this backend. Removing an absent chunk is a
    /// no-op.
    async fn delete(&self, key: ChunkKey) -> Result<()>;

    /// Number of chunks this backend holds for `stream_id`.
    async fn chunk_count(&self, stream_id: u64) -> Result<u64>;

    /// Whether the chunk holds exactly `chunk_size` bytes.
    async fn filled(&self, key: ChunkKey, chunk_size: u64) -> Result<bool> {
        Ok(self.size(key).await? == chunk_size)
    }
}
