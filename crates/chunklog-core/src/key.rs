//! Chunk identity.

use serde::{Deserialize, Serialize};

/// Identifies one chunk of one stream across every backing store.
///
/// The durable tier uses the pair directly as its composite primary key; the
/// hot tier flattens it into a string key via [`ChunkKey::hot_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    /// Opaque stream identifier (a job ID in the canonical deployment).
    pub stream_id: u64,

    /// Zero-based index of the chunk within the stream.
    pub chunk_index: u64,
}

impl ChunkKey {
    pub fn new(stream_id: u64, chunk_index: u64) -> Self {
        Self {
            stream_id,
            chunk_index,
        }
    }

    /// Key format used by the hot (cache) tier.
    ///
    /// The format is an external interface: operational tooling matches on
    /// the `live_trace_buffer:` prefix when scanning the cache store.
    pub fn hot_key(&self) -> String {
        format!("live_trace_buffer:{}:{}", self.stream_id, self.chunk_index)
    }

    /// Prefix matching every hot-tier key of one stream.
    pub fn hot_key_prefix(stream_id: u64) -> String {
        format!("live_trace_buffer:{}:", stream_id)
    }
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.stream_id, self.chunk_index)
    }
}
