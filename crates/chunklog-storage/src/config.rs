//! Storage Configuration
//!
//! ## StorageConfig
//!
//! Controls chunk geometry, lease lifetime, and backend wiring:
//!
//! - **chunk_size**: fixed chunk size in bytes (default: 128 KiB). Consistent
//!   across all tiers for a deployment; changing it underneath existing
//!   streams is not supported.
//! - **lease_ttl_ms**: write lease lifetime (default: 1 hour). Long enough to
//!   cover one write session, short enough to self-heal after a crashed
//!   writer.
//! - **archive_base_url**: optional HTTP(S) endpoint for frozen streams.
//! - **archive_request_timeout_ms**: per-request timeout for archive fetches
//!   (default: 10 s).
//! - **durable_path**: SQLite database path for the durable tier; `None`
//!   uses an in-memory database (tests, ephemeral deployments).
//!
//! ## Usage
//!
//! ```ignore
//! use chunklog_storage::StorageConfig;
//!
//! // Production config
//! let config = StorageConfig {
//!     durable_path: Some("/var/lib/chunklog/chunks.db".into()),
//!     archive_base_url: Some("https://archive.example.com/traces".to_string()),
//!     ..Default::default()
//! };
//!
//! // Test config: tiny chunks make boundary behavior easy to exercise
//! let config = StorageConfig {
//!     chunk_size: 4,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Chunk size in bytes (default: 128 KiB).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Write lease lifetime in milliseconds (default: 1 hour).
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: i64,

    /// Base URL for the archival tier (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_base_url: Option<String>,

    /// Request timeout for archive fetches in milliseconds (default: 10 s).
    #[serde(default = "default_archive_request_timeout_ms")]
    pub archive_request_timeout_ms: u64,

    /// SQLite path for the durable tier; `None` means in-memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durable_path: Option<PathBuf>,
}

fn default_chunk_size() -> u64 {
    chunklog_core::DEFAULT_CHUNK_SIZE
}

fn default_lease_ttl_ms() -> i64 {
    60 * 60 * 1000
}

fn default_archive_request_timeout_ms() -> u64 {
    10_000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            lease_ttl_ms: default_lease_ttl_ms(),
            archive_base_url: None,
            archive_request_timeout_ms: default_archive_request_timeout_ms(),
            durable_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.chunk_size, 128 * 1024);
        assert_eq!(config.lease_ttl_ms, 3_600_000);
        assert!(config.archive_base_url.is_none());
        assert!(config.durable_path.is_none());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config: StorageConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.chunk_size, 128 * 1024);
        assert_eq!(config.archive_request_timeout_ms, 10_000);
    }

    #[test]
    fn test_round_trip() {
        let config = StorageConfig {
            chunk_size: 4,
            archive_base_url: Some("https://archive.example.com".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: StorageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.chunk_size, 4);
        assert_eq!(
            back.archive_base_url.as_deref(),
            Some("https://archive.example.com")
        );
    }
}
