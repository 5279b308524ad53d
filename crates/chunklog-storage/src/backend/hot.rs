//! Hot Tier Backend
//!
//! In-memory keyed store holding the actively-written chunk of each live
//! stream, in the role a Redis instance plays in a shared deployment. Keys
//! follow the `live_trace_buffer:<stream_id>:<chunk_index>` format so that
//! operational tooling can scan a stream's buffers by prefix.
//!
//! This is the only tier that supports in-place truncation, which is why
//! the router demotes a durable chunk back here before a mid-chunk cut.

use crate::backend::ChunkBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chunklog_core::{ChunkKey, Tier};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory chunk store for the hot tier.
#[derive(Debug, Default)]
pub struct HotTierBackend {
    chunks: RwLock<HashMap<String, BytesMut>>,
}

impl HotTierBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkBackend for HotTierBackend {
    fn tier(&self) -> Tier {
        Tier::Hot
    }

    async fn get(&self, key: ChunkKey) -> Result<Bytes> {
        let chunks = self.chunks.read().await;

        match chunks.get(&key.hot_key()) {
            Some(buf) => Ok(Bytes::copy_from_slice(buf)),
            None => Err(Error::ChunkNotFound {
                stream_id: key.stream_id,
                chunk_index: key.chunk_index,
            }),
        }
    }

    async fn size(&self, key: ChunkKey) -> Result<u64> {
        let chunks = self.chunks.read().await;

        Ok(chunks
            .get(&key.hot_key())
            .map(|buf| buf.len() as u64)
            .unwrap_or(0))
    }

    async fn write(&self, key: ChunkKey, data: Bytes) -> Result<u64> {
        if data.is_empty() {
            return Err(Error::Write("could not write empty data".to_string()));
        }

        let len = data.len() as u64;
        let mut chunks = self.chunks.write().await;
        chunks.insert(key.hot_key(), BytesMut::from(&data[..]));
        debug!(%key, bytes = len, "hot chunk written");

        Ok(len)
    }

    async fn append(&self, key: ChunkKey, data: Bytes, expected_len: u64) -> Result<u64> {
        let mut chunks = self.chunks.write().await;

        let buf = chunks.get_mut(&key.hot_key()).ok_or_else(|| {
            Error::Write(format!("could not append to missing chunk {key}"))
        })?;

        buf.extend_from_slice(&data);

        // Post-append length check catches a competing writer's lost update.
        if buf.len() as u64 != expected_len {
            return Err(Error::Write(format!(
                "size mismatch after appending to chunk {key}: expected {expected_len}, got {}",
                buf.len()
            )));
        }

        Ok(data.len() as u64)
    }

    async fn truncate(&self, key: ChunkKey, len: u64) -> Result<()> {
        let mut chunks = self.chunks.write().await;

        let buf = chunks.get_mut(&key.hot_key()).ok_or(Error::ChunkNotFound {
            stream_id: key.stream_id,
            chunk_index: key.chunk_index,
        })?;

        if len > buf.len() as u64 {
            return Err(Error::Write(format!(
                "could not truncate chunk {key} to {len} bytes: only {} stored",
                buf.len()
            )));
        }

        buf.truncate(len as usize);
        debug!(%key, len, "hot chunk truncated");

        Ok(())
    }

    async fn delete(&self, key: ChunkKey) -> Result<()> {
        let mut chunks = self.chunks.write().await;
        chunks.remove(&key.hot_key());

        Ok(())
    }

    async fn chunk_count(&self, stream_id: u64) -> Result<u64> {
        let prefix = ChunkKey::hot_key_prefix(stream_id);
        let chunks = self.chunks.read().await;

        Ok(chunks.keys().filter(|k| k.starts_with(&prefix)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(chunk_index: u64) -> ChunkKey {
        ChunkKey::new(1, chunk_index)
    }

    // Test 1: Write then get round-trips
    #[tokio::test]
    async fn test_write_then_get() {
        let backend = HotTierBackend::new();

        let written = backend
            .write(key(0), Bytes::from_static(b"abcd"))
            .await
            .unwrap();
        assert_eq!(written, 4);
        assert_eq!(backend.get(key(0)).await.unwrap(), Bytes::from_static(b"abcd"));
        assert_eq!(backend.size(key(0)).await.unwrap(), 4);
    }

    // Test 2: Empty writes are rejected
    #[tokio::test]
    async fn test_empty_write_rejected() {
        let backend = HotTierBackend::new();

        let err = backend.write(key(0), Bytes::new()).await.unwrap_err();
        assert!(matches!(err, Error::Write(_)));
    }

    // Test 3: Get on a missing chunk is an error, size is zero
    #[tokio::test]
    async fn test_missing_chunk() {
        let backend = HotTierBackend::new();

        let err = backend.get(key(0)).await.unwrap_err();
        assert!(matches!(err, Error::ChunkNotFound { .. }));
        assert_eq!(backend.size(key(0)).await.unwrap(), 0);
    }

    // Test 4: Append extends existing content
    #[tokio::test]
    async fn test_append() {
        let backend = HotTierBackend::new();

        backend.write(key(0), Bytes::from_static(b"ab")).await.unwrap();
        let appended = backend
            .append(key(0), Bytes::from_static(b"cd"), 4)
            .await
            .unwrap();
        assert_eq!(appended, 2);
        assert_eq!(backend.get(key(0)).await.unwrap(), Bytes::from_static(b"abcd"));
    }

    // Test 5: Append to a missing chunk fails; write must create it
    #[tokio::test]
    async fn test_append_missing_chunk() {
        let backend = HotTierBackend::new();

        let err = backend
            .append(key(0), Bytes::from_static(b"ab"), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Write(_)));
    }

    // Test 6: Append detects a lost update via the expected length
    #[tokio::test]
    async fn test_append_length_mismatch() {
        let backend = HotTierBackend::new();

        backend.write(key(0), Bytes::from_static(b"abc")).await.unwrap();
        // Caller thought the chunk held 2 bytes; it holds 3.
        let err = backend
            .append(key(0), Bytes::from_static(b"d"), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Write(_)));
    }

    // Test 7: Truncate cuts in place
    #[tokio::test]
    async fn test_truncate() {
        let backend = HotTierBackend::new();

        backend.write(key(0), Bytes::from_static(b"abcd")).await.unwrap();
        backend.truncate(key(0), 1).await.unwrap();
        assert_eq!(backend.get(key(0)).await.unwrap(), Bytes::from_static(b"a"));
    }

    // Test 8: Truncate beyond stored length fails
    #[tokio::test]
    async fn test_truncate_beyond_length() {
        let backend = HotTierBackend::new();

        backend.write(key(0), Bytes::from_static(b"ab")).await.unwrap();
        let err = backend.truncate(key(0), 3).await.unwrap_err();
        assert!(matches!(err, Error::Write(_)));
    }

    // Test 9: Delete removes the chunk; deleting again is a no-op
    #[tokio::test]
    async fn test_delete_idempotent() {
        let backend = HotTierBackend::new();

        backend.write(key(0), Bytes::from_static(b"ab")).await.unwrap();
        backend.delete(key(0)).await.unwrap();
        assert_eq!(backend.size(key(0)).await.unwrap(), 0);
        backend.delete(key(0)).await.unwrap();
    }

    // Test 10: filled() compares against the chunk size
    #[tokio::test]
    async fn test_filled() {
        let backend = HotTierBackend::new();

        backend.write(key(0), Bytes::from_static(b"abcd")).await.unwrap();
        assert!(backend.filled(key(0), 4).await.unwrap());
        assert!(!backend.filled(key(0), 8).await.unwrap());
        assert!(!backend.filled(key(1), 4).await.unwrap());
    }

    // Test 11: chunk_count scans by stream prefix
    #[tokio::test]
    async fn test_chunk_count_per_stream() {
        let backend = HotTierBackend::new();

        backend.write(ChunkKey::new(1, 0), Bytes::from_static(b"a")).await.unwrap();
        backend.write(ChunkKey::new(1, 1), Bytes::from_static(b"b")).await.unwrap();
        backend.write(ChunkKey::new(2, 0), Bytes::from_static(b"c")).await.unwrap();

        assert_eq!(backend.chunk_count(1).await.unwrap(), 2);
        assert_eq!(backend.chunk_count(2).await.unwrap(), 1);
        assert_eq!(backend.chunk_count(3).await.unwrap(), 0);
    }
}
