//! Chunked Stream I/O
//!
//! [`ChunkedStream`] is the public I/O abstraction: one logical append-only
//! byte stream, transparently backed by fixed-size chunks spread across the
//! hot and durable tiers (or the archival tier for frozen streams).
//!
//! ## Read path
//!
//! ```text
//! read(n)
//!     ↓
//! which chunk holds `position`?          ← pure arithmetic (ChunkLayout)
//!     ↓
//! which tier holds that chunk?           ← pure function (ChunkRouter)
//!     ↓
//! cursor cache hit? ──YES──→ slice from the cached chunk
//!     ↓ NO
//! fetch chunk from its tier, cache it
//!     ↓
//! advance position, repeat until n bytes or end of stream
//! ```
//!
//! The cursor caches exactly one chunk together with the stream range it
//! covers, and is invalidated whenever `position` leaves that range or the
//! chunk is mutated. Readers take no lock; a reader racing a writer sees a
//! prefix consistent with the size it opened with.
//!
//! ## Write path
//!
//! Writes require the stream's exclusive lease, which is re-validated
//! against the lease store before any byte lands, so a writer whose lease
//! expired mid-session is rejected instead of silently corrupting a
//! successor's stream. Input is sliced at chunk boundaries; each segment
//! lands via `write` (fresh chunk) or `append` (existing chunk) on the
//! routed backend. The moment a hot chunk fills it stops being the stream's
//! last chunk, so it is promoted to the durable tier right there, keeping
//! reader-side tier selection consistent with where chunks actually live.
//!
//! A multi-chunk write is not atomic: segments already committed stay
//! committed if a later segment fails. Callers needing stronger guarantees
//! track their own high-water mark and retry from it.

use crate::error::{Error, Result};
use crate::lease::{LeaseStore, WriteLease};
use crate::router::ChunkRouter;
use bytes::{Bytes, BytesMut};
use chunklog_core::{ChunkKey, ChunkLayout, Tier};
use std::io::SeekFrom;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, warn};

/// How a stream was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Live read: last chunk from the hot tier, earlier chunks durable.
    Read,
    /// Frozen read: every chunk from the archival tier.
    ReadArchived,
    /// Exclusive append; holds the stream's write lease.
    Append,
}

/// One cached chunk plus the stream range its bytes cover.
struct ChunkCursor {
    chunk_index: u64,
    data: Bytes,
    valid_range: Range<u64>,
}

/// A logical append-only byte stream over chunked, tiered storage.
///
/// All offsets are global stream offsets; chunk arithmetic stays internal.
/// The stream object is single-threaded by design: mutating operations take
/// `&mut self`, and cross-writer exclusion is the lease's job, not a lock's.
pub struct ChunkedStream {
    stream_id: u64,
    mode: OpenMode,
    position: u64,
    size: u64,
    layout: ChunkLayout,
    router: Arc<ChunkRouter>,
    leases: Arc<dyn LeaseStore>,
    lease: Option<WriteLease>,
    cursor: Option<ChunkCursor>,
}

impl ChunkedStream {
    pub(crate) fn new(
        stream_id: u64,
        size: u64,
        mode: OpenMode,
        layout: ChunkLayout,
        router: Arc<ChunkRouter>,
        leases: Arc<dyn LeaseStore>,
        lease: Option<WriteLease>,
    ) -> Self {
        let position = match mode {
            OpenMode::Append => size,
            OpenMode::Read | OpenMode::ReadArchived => 0,
        };

        Self {
            stream_id,
            mode,
            position,
            size,
            layout,
            router,
            leases,
            lease,
            cursor: None,
        }
    }

    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    /// Total stream size in bytes, as of the most recent local operation.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current cursor position. Always within `[0, size]`.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Move the cursor. The result must land inside `[0, size]`.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
            SeekFrom::End(delta) => self.size as i128 + delta as i128,
        };

        if target < 0 || target > self.size as i128 {
            return Err(Error::OutOfRange {
                pos: target as i64,
                size: self.size,
            });
        }

        self.position = target as u64;
        Ok(self.position)
    }

    /// Read up to `max_len` bytes from the current position.
    ///
    /// Returns fewer bytes than requested only at end of stream; an empty
    /// result on an empty (or fully consumed) stream is not an error.
    pub async fn read(&mut self, max_len: usize) -> Result<Bytes> {
        let mut remaining = (max_len as u64).min(self.size.saturating_sub(self.position));
        let mut out = BytesMut::with_capacity(remaining as usize);

        while remaining > 0 {
            let window = self.readable_window().await?;
            let take = window.len().min(remaining as usize);
            out.extend_from_slice(&window[..take]);
            self.position += take as u64;
            remaining -= take as u64;
        }

        Ok(out.freeze())
    }

    /// Read everything from the current position to the end of the stream.
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let remaining = self.size.saturating_sub(self.position);
        self.read(remaining as usize).await
    }

    /// Read up to and including the next `\n`, or to end of stream.
    pub async fn read_line(&mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();

        while self.position < self.size {
            let window = self.readable_window().await?;
            match memchr::memchr(b'\n', &window) {
                Some(at) => {
                    out.extend_from_slice(&window[..=at]);
                    self.position += at as u64 + 1;
                    break;
                }
                None => {
                    out.extend_from_slice(&window);
                    self.position += window.len() as u64;
                }
            }
        }

        Ok(out.freeze())
    }

    /// Append `data` at the current position, slicing it across chunk
    /// boundaries. Returns the number of bytes written.
    ///
    /// Requires a valid write lease. Each chunk segment is committed
    /// independently; on failure, segments already written stay written and
    /// `size` reflects them.
    pub async fn write(&mut self, data: &[u8]) -> Result<u64> {
        self.writable_lease().await?;

        if data.is_empty() {
            return Err(Error::Write("could not write empty data".to_string()));
        }

        let chunk_size = self.layout.chunk_size();
        let mut written = 0u64;
        let mut rest = data;

        while !rest.is_empty() {
            let idx = self.layout.chunk_index(self.position);
            let offset = self.layout.chunk_offset(self.position);

            // Repair pass for a crashed predecessor: a full chunk left in
            // the hot tier would be unreachable once this chunk has bytes.
            if offset == 0 && idx > 0 {
                self.seal_filled_chunk(idx - 1).await?;
            }

            let space = (chunk_size - offset) as usize;
            let take = space.min(rest.len());
            let segment = Bytes::copy_from_slice(&rest[..take]);

            let chunks_count = self.layout.chunks_count(self.size);
            let tier = self.router.tier_for(idx, chunks_count, false);
            let backend = self.router.backend(tier)?;
            let key = ChunkKey::new(self.stream_id, idx);

            let stored = backend.size(key).await?;
            let landed = if stored == 0 {
                if offset != 0 {
                    return Err(Error::Write(format!(
                        "chunk {key} is empty but the cursor is at offset {offset}"
                    )));
                }
                backend.write(key, segment).await?
            } else {
                backend.append(key, segment, offset + take as u64).await?
            };

            if landed != take as u64 {
                return Err(Error::Write(format!(
                    "short write on chunk {key}: {landed} of {take} bytes"
                )));
            }

            self.position += landed;
            self.size = self.size.max(self.position);
            self.invalidate_cursor(idx);
            written += landed;
            rest = &rest[take..];

            // A hot chunk that just filled stops being the last chunk, so
            // readers will route it to the durable tier from now on. Move
            // it there before returning.
            if tier == Tier::Hot && !self.layout.is_last(idx, self.size) {
                self.router.promote(key, chunk_size).await?;
                self.invalidate_cursor(idx);
            }
        }

        Ok(written)
    }

    /// Cut the stream down to `offset` bytes.
    ///
    /// Chunks wholly beyond the cut are deleted; the boundary chunk is
    /// truncated in place, demoted back to the hot tier first when
    /// promotion already moved it. Leaves `position == size == offset`.
    pub async fn truncate(&mut self, offset: u64) -> Result<()> {
        self.writable_lease().await?;

        if offset > self.size {
            return Err(Error::OutOfRange {
                pos: offset as i64,
                size: self.size,
            });
        }

        let cut_idx = self.layout.chunk_index(offset);
        let cut_off = self.layout.chunk_offset(offset);

        // Walk from the last chunk backwards, dropping everything at or
        // beyond the cut point. A chunk may sit in either mutable tier
        // depending on how far promotion got, so both are cleared.
        let mut idx = self.layout.last_index(self.size);
        loop {
            if idx > cut_idx || cut_off == 0 {
                self.router
                    .delete_everywhere(ChunkKey::new(self.stream_id, idx))
                    .await?;
            }
            if idx == cut_idx {
                break;
            }
            idx -= 1;
        }

        if cut_off > 0 {
            let key = ChunkKey::new(self.stream_id, cut_idx);
            let hot = self.router.backend(Tier::Hot)?;
            if hot.size(key).await? == 0 {
                // Only the hot tier can cut a chunk mid-way.
                self.router.demote(key).await?;
            }
            hot.truncate(key, cut_off).await?;
        }

        debug!(
            stream_id = self.stream_id,
            from = self.size,
            to = offset,
            "stream truncated"
        );

        self.position = offset;
        self.size = offset;
        self.cursor = None;

        Ok(())
    }

    /// Release the write lease, if held. Idempotent; returns the final
    /// stream size so the caller can persist it.
    pub async fn close(&mut self) -> Result<u64> {
        if let Some(lease) = self.lease.take() {
            self.leases.release(self.stream_id, lease.lease_id).await?;
        }

        Ok(self.size)
    }

    /// Window of readable bytes at `position` within the current chunk,
    /// served from the cursor cache when it still covers the position.
    ///
    /// Callers only invoke this with `position < size`, so an empty window
    /// means the expected tier lost the chunk: that is a consistency
    /// failure, not a quiet end of stream.
    async fn readable_window(&mut self) -> Result<Bytes> {
        let idx = self.layout.chunk_index(self.position);
        let start = self.layout.chunk_start(idx);

        let cursor = match self.cursor.take() {
            Some(c) if c.chunk_index == idx && c.valid_range.contains(&self.position) => c,
            _ => {
                let data = self.fetch_chunk(idx).await?;
                let end = start + data.len() as u64;
                ChunkCursor {
                    chunk_index: idx,
                    data,
                    valid_range: start..end,
                }
            }
        };

        let readable_end = cursor.valid_range.end.min(self.size);
        let window = if self.position < readable_end {
            cursor
                .data
                .slice((self.position - start) as usize..(readable_end - start) as usize)
        } else {
            Bytes::new()
        };
        self.cursor = Some(cursor);

        if window.is_empty() {
            return Err(Error::ChunkNotFound {
                stream_id: self.stream_id,
                chunk_index: idx,
            });
        }

        Ok(window)
    }

    async fn fetch_chunk(&self, chunk_index: u64) -> Result<Bytes> {
        let archived = self.mode == OpenMode::ReadArchived;
        let chunks_count = self.layout.chunks_count(self.size);
        let tier = self.router.tier_for(chunk_index, chunks_count, archived);
        let backend = self.router.backend(tier)?;

        backend.get(ChunkKey::new(self.stream_id, chunk_index)).await
    }

    /// Promote `chunk_index` if it sits full in the hot tier.
    async fn seal_filled_chunk(&mut self, chunk_index: u64) -> Result<()> {
        let key = ChunkKey::new(self.stream_id, chunk_index);
        let hot = self.router.backend(Tier::Hot)?;

        if hot.filled(key, self.layout.chunk_size()).await? {
            self.router.promote(key, self.layout.chunk_size()).await?;
            self.invalidate_cursor(chunk_index);
        }

        Ok(())
    }

    fn invalidate_cursor(&mut self, chunk_index: u64) {
        if let Some(cursor) = &self.cursor {
            if cursor.chunk_index == chunk_index {
                self.cursor = None;
            }
        }
    }

    /// Confirm this stream may write: opened for append and the lease is
    /// still valid in the lease store. A writer that lost its lease to
    /// expiry gets rejected here before touching any chunk.
    async fn writable_lease(&self) -> Result<&WriteLease> {
        let lease = match (self.mode, &self.lease) {
            (OpenMode::Append, Some(lease)) => lease,
            _ => {
                return Err(Error::Write(
                    "stream is not open for writing".to_string(),
                ))
            }
        };

        if !self.leases.is_held(self.stream_id, lease.lease_id).await? {
            return Err(Error::Write(
                "write lease expired or was taken over".to_string(),
            ));
        }

        Ok(lease)
    }
}

impl std::fmt::Debug for ChunkedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedStream")
            .field("stream_id", &self.stream_id)
            .field("mode", &self.mode)
            .field("position", &self.position)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Drop for ChunkedStream {
    fn drop(&mut self) {
        // Best-effort release when the caller skipped close(); the lease TTL
        // is the backstop if no runtime is available to run it.
        if let Some(lease) = self.lease.take() {
            let leases = self.leases.clone();
            let stream_id = self.stream_id;

            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(error) = leases.release(stream_id, lease.lease_id).await {
                        warn!(stream_id, %error, "failed to release write lease on drop");
                    }
                });
            }
        }
    }
}
