//! Storage Error Types
//!
//! This module defines all error types that can occur during storage engine
//! operations.
//!
//! ## Error Categories
//!
//! ### Write-path errors
//! - `Write`: writing without a valid lease, writing empty data, or a
//!   backend reporting a different size than the caller computed
//! - `AlreadyLocked`: another writer holds the stream's lease
//!
//! ### Consistency errors
//! - `ChunkNotFound`: a chunk is missing from the tier that should hold it
//! - `ChecksumMismatch`: a durable row failed CRC verification
//!
//! ### Capability errors
//! - `TruncateUnsupported`: in-place truncation attempted on a tier that
//!   only supports wholesale deletion
//! - `ReadOnly`: mutation attempted on the archival tier
//!
//! ### Archive errors
//! - `InvalidUrl`: malformed or non-HTTP(S) archive URL
//! - `FailedToGetChunk`: archive responded with a non-2xx status
//! - `ArchiveUnavailable`: archived stream opened with no archive configured
//!
//! ## Propagation
//!
//! Backend-level errors propagate unchanged to the caller; the engine never
//! retries a failed chunk write and never converts a transport failure into
//! empty content. All operations return `Result<T>`, aliased to
//! `Result<T, Error>`, so `?` composes throughout.

use chunklog_core::Tier;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("write failed: {0}")]
    Write(String),

    #[error("stream {0} is already locked for writing")]
    AlreadyLocked(u64),

    #[error("chunk not found: stream {stream_id} chunk {chunk_index}")]
    ChunkNotFound { stream_id: u64, chunk_index: u64 },

    #[error("truncate is not supported by the {0} tier")]
    TruncateUnsupported(Tier),

    #[error("the {0} tier is read-only")]
    ReadOnly(Tier),

    #[error("invalid archive url: {0}")]
    InvalidUrl(String),

    #[error("position {pos} is out of range for a stream of {size} bytes")]
    OutOfRange { pos: i64, size: u64 },

    #[error("failed to fetch chunk: archive responded with status {status}")]
    FailedToGetChunk { status: u16 },

    #[error("checksum mismatch: stream {stream_id} chunk {chunk_index}")]
    ChecksumMismatch { stream_id: u64, chunk_index: u64 },

    #[error("stream is archived but no archive backend is configured")]
    ArchiveUnavailable,

    #[error("layout error: {0}")]
    Layout(#[from] chunklog_core::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
