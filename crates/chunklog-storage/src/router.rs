//! Chunk Router and Promotion Policy
//!
//! Given a chunk's coordinates, decides which tier should hold it, and moves
//! chunks between tiers at the two lifecycle transitions:
//!
//! ```text
//!            fills, next chunk opens
//!   ┌─────┐ ───────promote───────→ ┌─────────┐
//!   │ hot │                        │ durable │
//!   └─────┘ ←───────demote──────── └─────────┘
//!            truncation lands mid-chunk
//! ```
//!
//! Tier selection is a pure function of `(chunk_index, chunks_count)`: the
//! last chunk of a live stream is hot, everything earlier is durable, and an
//! archived stream reads wholly from the archival tier. The function is
//! recomputed on every access; no "current tier" state is carried that could
//! drift from where the chunk actually lives.
//!
//! When the computed tier does not hold the chunk, that is a consistency
//! failure (`ChunkNotFound`) and is surfaced as such — the router never
//! silently falls back to another tier on a read.

use crate::backend::ChunkBackend;
use crate::error::{Error, Result};
use chunklog_core::{ChunkKey, Tier};
use std::sync::Arc;
use tracing::{debug, info};

/// Routes chunk operations to the backend owning each tier.
pub struct ChunkRouter {
    hot: Arc<dyn ChunkBackend>,
    durable: Arc<dyn ChunkBackend>,
    archive: Option<Arc<dyn ChunkBackend>>,
}

impl ChunkRouter {
    pub fn new(hot: Arc<dyn ChunkBackend>, durable: Arc<dyn ChunkBackend>) -> Self {
        Self {
            hot,
            durable,
            archive: None,
        }
    }

    /// Attach an archival backend for frozen streams.
    pub fn with_archive(mut self, archive: Arc<dyn ChunkBackend>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn has_archive(&self) -> bool {
        self.archive.is_some()
    }

    /// Tier that should hold `chunk_index` of a stream spanning
    /// `chunks_count` chunks.
    pub fn tier_for(&self, chunk_index: u64, chunks_count: u64, archived: bool) -> Tier {
        if archived {
            Tier::Archival
        } else if chunk_index + 1 == chunks_count {
            Tier::Hot
        } else {
            Tier::Durable
        }
    }

    /// Resolve the backend for a tier.
    pub fn backend(&self, tier: Tier) -> Result<&Arc<dyn ChunkBackend>> {
        match tier {
            Tier::Hot => Ok(&self.hot),
            Tier::Durable => Ok(&self.durable),
            Tier::Archival => self.archive.as_ref().ok_or(Error::ArchiveUnavailable),
        }
    }

    /// Move a completed chunk from the hot tier to the durable tier.
    ///
    /// Refuses to persist anything shorter than a full chunk: promotion only
    /// happens once a chunk has filled, so a short read here means the hot
    /// copy was clobbered underneath us.
    pub async fn promote(&self, key: ChunkKey, chunk_size: u64) -> Result<()> {
        let data = self.hot.get(key).await?;

        if data.len() as u64 != chunk_size {
            return Err(Error::Write(format!(
                "refusing to persist partially written chunk {key}: {} of {chunk_size} bytes",
                data.len()
            )));
        }

        self.durable.write(key, data).await?;
        self.hot.delete(key).await?;
        info!(%key, "chunk promoted to durable tier");

        Ok(())
    }

    /// Move a chunk from the durable tier back to the hot tier so it can be
    /// truncated in place.
    pub async fn demote(&self, key: ChunkKey) -> Result<()> {
        let data = self.durable.get(key).await?;

        self.hot.write(key, data).await?;
        self.durable.delete(key).await?;
        debug!(%key, "chunk demoted to hot tier");

        Ok(())
    }

    /// Remove a chunk from every mutable tier.
    ///
    /// Used by truncation and stream destruction, where a chunk may sit in
    /// either tier depending on how far promotion got.
    pub async fn delete_everywhere(&self, key: ChunkKey) -> Result<()> {
        self.hot.delete(key).await?;
        self.durable.delete(key).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DurableTierBackend, HotTierBackend};
    use bytes::Bytes;

    async fn router() -> ChunkRouter {
        ChunkRouter::new(
            Arc::new(HotTierBackend::new()),
            Arc::new(DurableTierBackend::new_in_memory().await.unwrap()),
        )
    }

    // Test 1: tier selection is pure in (index, count, archived)
    #[tokio::test]
    async fn test_tier_for() {
        let router = router().await;

        // Single-chunk stream: the only chunk is the last chunk.
        assert_eq!(router.tier_for(0, 1, false), Tier::Hot);

        // Multi-chunk stream: earlier chunks are durable, last is hot.
        assert_eq!(router.tier_for(0, 3, false), Tier::Durable);
        assert_eq!(router.tier_for(1, 3, false), Tier::Durable);
        assert_eq!(router.tier_for(2, 3, false), Tier::Hot);

        // Archived streams read from the archive no matter the index.
        assert_eq!(router.tier_for(0, 3, true), Tier::Archival);
        assert_eq!(router.tier_for(2, 3, true), Tier::Archival);
    }

    // Test 2: resolving the archival tier without an archive configured fails
    #[tokio::test]
    async fn test_archive_unavailable() {
        let router = router().await;

        assert!(router.backend(Tier::Hot).is_ok());
        assert!(router.backend(Tier::Durable).is_ok());
        let err = router.backend(Tier::Archival).unwrap_err();
        assert!(matches!(err, Error::ArchiveUnavailable));
    }

    // Test 3: promotion moves a full chunk hot → durable
    #[tokio::test]
    async fn test_promote() {
        let router = router().await;
        let key = ChunkKey::new(1, 0);

        router
            .backend(Tier::Hot)
            .unwrap()
            .write(key, Bytes::from_static(b"abcd"))
            .await
            .unwrap();

        router.promote(key, 4).await.unwrap();

        let hot = router.backend(Tier::Hot).unwrap();
        let durable = router.backend(Tier::Durable).unwrap();
        assert_eq!(hot.size(key).await.unwrap(), 0);
        assert_eq!(durable.get(key).await.unwrap(), Bytes::from_static(b"abcd"));
    }

    // Test 4: promotion refuses a partially written chunk
    #[tokio::test]
    async fn test_promote_partial_chunk_refused() {
        let router = router().await;
        let key = ChunkKey::new(1, 0);

        router
            .backend(Tier::Hot)
            .unwrap()
            .write(key, Bytes::from_static(b"ab"))
            .await
            .unwrap();

        let err = router.promote(key, 4).await.unwrap_err();
        assert!(matches!(err, Error::Write(_)));

        // Nothing moved.
        let hot = router.backend(Tier::Hot).unwrap();
        assert_eq!(hot.size(key).await.unwrap(), 2);
    }

    // Test 5: demotion moves a chunk durable → hot
    #[tokio::test]
    async fn test_demote() {
        let router = router().await;
        let key = ChunkKey::new(1, 0);

        router
            .backend(Tier::Durable)
            .unwrap()
            .write(key, Bytes::from_static(b"abcd"))
            .await
            .unwrap();

        router.demote(key).await.unwrap();

        let hot = router.backend(Tier::Hot).unwrap();
        let durable = router.backend(Tier::Durable).unwrap();
        assert_eq!(hot.get(key).await.unwrap(), Bytes::from_static(b"abcd"));
        assert_eq!(durable.size(key).await.unwrap(), 0);
    }

    // Test 6: delete_everywhere clears both mutable tiers
    #[tokio::test]
    async fn test_delete_everywhere() {
        let router = router().await;
        let key = ChunkKey::new(1, 0);

        router
            .backend(Tier::Hot)
            .unwrap()
            .write(key, Bytes::from_static(b"ab"))
            .await
            .unwrap();
        router
            .backend(Tier::Durable)
            .unwrap()
            .write(key, Bytes::from_static(b"cd"))
            .await
            .unwrap();

        router.delete_everywhere(key).await.unwrap();

        assert_eq!(router.backend(Tier::Hot).unwrap().size(key).await.unwrap(), 0);
        assert_eq!(router.backend(Tier::Durable).unwrap().size(key).await.unwrap(), 0);
    }
}
