//! Error type for the core data model.
//!
//! Only layout construction can fail at this layer. Storage-level failures
//! (missing chunks, lease conflicts, transport errors) are defined in
//! `chunklog-storage`, which wraps this type via `#[from]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

pub type Result<T> = std::result::Result<T, Error>;
