//! Storage Manager
//!
//! [`ChunkStorage`] is the engine's entry point. It owns the router, the
//! lease store, and the configuration, and hands out [`ChunkedStream`]
//! handles in the right mode:
//!
//! ```text
//! ingestion endpoint ──open_append──→ ChunkedStream (exclusive lease)
//! log viewer        ──open_read────→ ChunkedStream (no lock)
//! log viewer        ──open_archived→ ChunkedStream (archival tier only)
//! retention job     ──destroy──────→ all chunks removed
//! ```
//!
//! Stream metadata (the current size) belongs to the consumer — the job
//! record in the canonical deployment — so every open takes the stream's
//! size and `close()` returns the updated value for the consumer to
//! persist.

use crate::backend::{ArchivalTierBackend, DurableTierBackend, HotTierBackend};
use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::lease::{InMemoryLeaseStore, LeaseStore, WriteLease};
use crate::router::ChunkRouter;
use crate::stream::{ChunkedStream, OpenMode};
use chunklog_core::{ChunkKey, ChunkLayout};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Owns the tiered backends and arbitrates stream access.
pub struct ChunkStorage {
    config: StorageConfig,
    layout: ChunkLayout,
    router: Arc<ChunkRouter>,
    leases: Arc<dyn LeaseStore>,
}

impl ChunkStorage {
    /// Assemble a storage engine from pre-built parts.
    pub fn new(
        router: Arc<ChunkRouter>,
        leases: Arc<dyn LeaseStore>,
        config: StorageConfig,
    ) -> Result<Self> {
        let layout = ChunkLayout::new(config.chunk_size)?;

        Ok(Self {
            config,
            layout,
            router,
            leases,
        })
    }

    /// Build the standard deployment from configuration: in-memory hot
    /// tier, SQLite durable tier, optional HTTP archive, in-process leases.
    pub async fn from_config(config: StorageConfig) -> Result<Self> {
        let layout = ChunkLayout::new(config.chunk_size)?;

        let durable = match &config.durable_path {
            Some(path) => DurableTierBackend::new(path).await?,
            None => DurableTierBackend::new_in_memory().await?,
        };

        let mut router = ChunkRouter::new(Arc::new(HotTierBackend::new()), Arc::new(durable));

        if let Some(base_url) = &config.archive_base_url {
            let archive = ArchivalTierBackend::new(
                base_url,
                layout,
                Duration::from_millis(config.archive_request_timeout_ms),
            )?;
            router = router.with_archive(Arc::new(archive));
        }

        Self::new(
            Arc::new(router),
            Arc::new(InMemoryLeaseStore::new()),
            config,
        )
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    /// Open a live stream for reading. Takes no lock; concurrent readers
    /// are unconstrained.
    pub async fn open_read(&self, stream_id: u64, size: u64) -> Result<ChunkedStream> {
        Ok(self.stream(stream_id, size, OpenMode::Read, None))
    }

    /// Open a frozen stream whose bytes live in the archival tier.
    pub async fn open_archived(&self, stream_id: u64, size: u64) -> Result<ChunkedStream> {
        if !self.router.has_archive() {
            return Err(Error::ArchiveUnavailable);
        }

        Ok(self.stream(stream_id, size, OpenMode::ReadArchived, None))
    }

    /// Open a stream for exclusive appending.
    ///
    /// Fails immediately with [`Error::AlreadyLocked`] when another writer
    /// holds the stream; the caller owns any retry policy.
    pub async fn open_append(&self, stream_id: u64, size: u64) -> Result<ChunkedStream> {
        let lease = self
            .leases
            .try_acquire(stream_id, self.config.lease_ttl_ms)
            .await?;

        Ok(self.stream(stream_id, size, OpenMode::Append, Some(lease)))
    }

    /// Remove every chunk of a stream from the mutable tiers.
    ///
    /// Takes the write lease for the duration so no concurrent writer can
    /// interleave, and releases it even when deletion fails part-way.
    pub async fn destroy(&self, stream_id: u64, size: u64) -> Result<()> {
        let lease = self
            .leases
            .try_acquire(stream_id, self.config.lease_ttl_ms)
            .await?;

        let result = self.delete_all_chunks(stream_id, size).await;
        self.leases.release(stream_id, lease.lease_id).await?;

        if result.is_ok() {
            info!(stream_id, "stream destroyed");
        }

        result
    }

    async fn delete_all_chunks(&self, stream_id: u64, size: u64) -> Result<()> {
        for chunk_index in 0..self.layout.chunks_count(size) {
            self.router
                .delete_everywhere(ChunkKey::new(stream_id, chunk_index))
                .await?;
        }

        Ok(())
    }

    fn stream(
        &self,
        stream_id: u64,
        size: u64,
        mode: OpenMode,
        lease: Option<WriteLease>,
    ) -> ChunkedStream {
        ChunkedStream::new(
            stream_id,
            size,
            mode,
            self.layout,
            self.router.clone(),
            self.leases.clone(),
            lease,
        )
    }
}
