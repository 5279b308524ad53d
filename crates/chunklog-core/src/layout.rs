//! Chunk Geometry
//!
//! A logical stream is stored as a sequence of fixed-size chunks. All of the
//! offset arithmetic lives here so that the router and the stream I/O layer
//! never compute it ad hoc:
//!
//! ```text
//! position:     0         chunk_size   2*chunk_size  ...
//!               │             │             │
//!               ▼             ▼             ▼
//! stream:       ┌─────────────┬─────────────┬─────────┐
//!               │   chunk 0   │   chunk 1   │ chunk 2 │  ← last chunk may
//!               └─────────────┴─────────────┴─────────┘    be short
//! ```
//!
//! Only the last chunk of a stream may hold fewer than `chunk_size` bytes;
//! every earlier chunk is exactly full. A zero-length stream conceptually
//! owns one empty chunk, which is why [`ChunkLayout::chunks_count`] never
//! returns zero.

use crate::error::{Error, Result};

/// Default chunk size: 128 KiB.
///
/// Fixed per deployment. Changing it underneath existing streams is not a
/// supported migration, because chunk indexes are derived from it.
pub const DEFAULT_CHUNK_SIZE: u64 = 128 * 1024;

/// Maps stream positions onto chunk coordinates.
///
/// Pure arithmetic over a fixed chunk size; cheap to copy and recompute per
/// call, so callers never carry cached "current chunk" state that can drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    chunk_size: u64,
}

impl ChunkLayout {
    pub fn new(chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Index of the chunk containing `position`.
    pub fn chunk_index(&self, position: u64) -> u64 {
        position / self.chunk_size
    }

    /// Offset of `position` within its chunk.
    pub fn chunk_offset(&self, position: u64) -> u64 {
        position % self.chunk_size
    }

    /// Stream offset at which `chunk_index` begins.
    pub fn chunk_start(&self, chunk_index: u64) -> u64 {
        chunk_index * self.chunk_size
    }

    /// Number of chunks a stream of `size` bytes occupies.
    ///
    /// At least one chunk always exists conceptually, even for an empty
    /// stream: the next write lands in it.
    pub fn chunks_count(&self, size: u64) -> u64 {
        size / self.chunk_size + 1
    }

    /// Index of the last (possibly short, possibly empty) chunk.
    pub fn last_index(&self, size: u64) -> u64 {
        self.chunks_count(size) - 1
    }

    /// Whether `chunk_index` is the last chunk of a stream of `size` bytes.
    pub fn is_last(&self, chunk_index: u64, size: u64) -> bool {
        chunk_index == self.last_index(size)
    }
}

impl Default for ChunkLayout {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}
