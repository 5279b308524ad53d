//! Write Lease Management
//!
//! Enforces at-most-one writer per stream via a leased, time-bounded
//! exclusive lock.
//!
//! ## State machine
//!
//! ```text
//! UNLOCKED ──try_acquire──→ LOCKED(lease_id, expires_at) ──release──→ UNLOCKED
//!                                   │
//!                                   └──(TTL elapses)──→ UNLOCKED
//! ```
//!
//! A writer that cannot obtain the lease receives an immediate
//! [`Error::AlreadyLocked`] rather than blocking; the library never
//! spin-retries, the caller decides retry policy. If a writer crashes or
//! hangs, its lease simply expires and a new writer may proceed. Should the
//! hung writer resume, its lease ID no longer validates and its writes are
//! rejected instead of silently applied.
//!
//! ## Backends
//!
//! [`LeaseStore`] can be implemented over any key-value store with atomic
//! compare-and-set plus TTL semantics. [`InMemoryLeaseStore`] is the
//! single-process implementation: grant if the slot is absent or the
//! previous lease has expired, conflict otherwise.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Get current timestamp in milliseconds
fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// An exclusive, time-bounded write grant for one stream.
#[derive(Debug, Clone)]
pub struct WriteLease {
    /// Stream the lease covers.
    pub stream_id: u64,

    /// Token identifying this particular grant. Release and validation both
    /// require it, so a stale holder cannot clear a successor's lease.
    pub lease_id: Uuid,

    /// Expiry timestamp, milliseconds since the Unix epoch.
    pub expires_at_ms: i64,
}

impl WriteLease {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

/// Abstraction over the store that arbitrates write exclusivity.
#[async_trait]
pub trait LeaseStore: Send + Sync + 'static {
    /// Atomically take the lease for `stream_id` if it is free or expired.
    ///
    /// Fails immediately with [`Error::AlreadyLocked`] when a different,
    /// still-valid lease holds the stream.
    async fn try_acquire(&self, stream_id: u64, ttl_ms: i64) -> Result<WriteLease>;

    /// Clear the lease if `lease_id` still holds it.
    ///
    /// Best-effort: releasing an expired, replaced, or unknown lease is a
    /// no-op so that close paths can always call it.
    async fn release(&self, stream_id: u64, lease_id: Uuid) -> Result<()>;

    /// Whether `lease_id` currently holds a valid lease on `stream_id`.
    async fn is_held(&self, stream_id: u64, lease_id: Uuid) -> Result<bool>;
}

/// Single-process lease store.
///
/// One slot per stream; compare-and-set under a mutex stands in for the
/// atomic operation a shared deployment would run against its key-value
/// store.
#[derive(Default)]
pub struct InMemoryLeaseStore {
    leases: Mutex<HashMap<u64, WriteLease>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn try_acquire(&self, stream_id: u64, ttl_ms: i64) -> Result<WriteLease> {
        let now = now_ms();
        let mut leases = self.leases.lock().await;

        if let Some(existing) = leases.get(&stream_id) {
            if !existing.is_expired_at(now) {
                return Err(Error::AlreadyLocked(stream_id));
            }
        }

        let lease = WriteLease {
            stream_id,
            lease_id: Uuid::new_v4(),
            expires_at_ms: now + ttl_ms,
        };
        leases.insert(stream_id, lease.clone());
        debug!(stream_id, lease_id = %lease.lease_id, "write lease acquired");

        Ok(lease)
    }

    async fn release(&self, stream_id: u64, lease_id: Uuid) -> Result<()> {
        let mut leases = self.leases.lock().await;

        if let Some(existing) = leases.get(&stream_id) {
            if existing.lease_id == lease_id {
                leases.remove(&stream_id);
                debug!(stream_id, %lease_id, "write lease released");
            }
        }

        Ok(())
    }

    async fn is_held(&self, stream_id: u64, lease_id: Uuid) -> Result<bool> {
        let now = now_ms();
        let leases = self.leases.lock().await;

        Ok(leases
            .get(&stream_id)
            .map(|lease| lease.lease_id == lease_id && !lease.is_expired_at(now))
            .unwrap_or(false))
    }
}
