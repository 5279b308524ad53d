//! Storage tier classification.

use serde::{Deserialize, Serialize};

/// Storage tier a chunk lives in.
///
/// The actively-written (last) chunk of a live stream sits in the hot tier;
/// completed chunks are promoted to the durable tier; frozen streams are
/// read from the archival tier. The tier for a given chunk is recomputed on
/// every access from `(chunk_index, chunks_count)` rather than tracked as
/// mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Low-latency, size-limited cache holding the chunk being written.
    Hot,
    /// Persistent row store holding completed chunks.
    Durable,
    /// Read-only, network-addressed store for frozen streams.
    Archival,
}

impl Tier {
    /// Whether chunks in this tier can be created or appended to.
    pub fn is_writable(&self) -> bool {
        match self {
            Tier::Hot | Tier::Durable => true,
            Tier::Archival => false,
        }
    }

    /// Whether chunks in this tier support in-place partial truncation.
    ///
    /// Only the hot tier does; durable and archival chunks are deleted
    /// wholesale instead.
    pub fn supports_truncate(&self) -> bool {
        matches!(self, Tier::Hot)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Hot => write!(f, "hot"),
            Tier::Durable => write!(f, "durable"),
            Tier::Archival => write!(f, "archival"),
        }
    }
}
