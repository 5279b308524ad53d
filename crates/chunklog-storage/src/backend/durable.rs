//! Durable Tier Backend
//!
//! SQLite row store holding completed chunks, one row per chunk keyed by the
//! `(stream_id, chunk_index)` composite primary key.
//!
//! ## Why SQLite?
//!
//! For a single-node deployment an embedded database is ideal: zero
//! configuration, ACID upserts, and a connection pool that makes the backend
//! freely shareable across async tasks. Tests run against an in-memory
//! database; deployments point at a file.
//!
//! ## Integrity
//!
//! Every row stores a CRC32 of its payload, computed on write and verified
//! on read. A mismatch surfaces as `ChecksumMismatch` rather than silently
//! returning corrupt bytes.
//!
//! Completed chunks are immutable in the normal write path: `append` exists
//! to satisfy the backend contract but the engine only ever appends to the
//! hot tier. In-place truncation is not supported here at all; a chunk that
//! must be cut mid-way is demoted to the hot tier first, and chunks past a
//! truncation point are deleted wholesale.

use crate::backend::ChunkBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chunklog_core::{ChunkKey, Tier};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stream_chunks (
    stream_id   INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL,
    data        BLOB    NOT NULL,
    checksum    INTEGER NOT NULL,
    created_at  INTEGER NOT NULL,
    PRIMARY KEY (stream_id, chunk_index)
)
"#;

/// Get current timestamp in milliseconds
fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// SQLite-backed chunk store for the durable tier.
#[derive(Debug)]
pub struct DurableTierBackend {
    pool: SqlitePool,
}

impl DurableTierBackend {
    /// Open (or create) a file-backed store.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", path.as_ref().display()))?
                .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Create an in-memory store (tests, ephemeral deployments).
    ///
    /// A single connection keeps the in-memory database alive and visible to
    /// every caller; separate pooled connections would each see their own
    /// empty database.
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ChunkBackend for DurableTierBackend {
    fn tier(&self) -> Tier {
        Tier::Durable
    }

    async fn get(&self, key: ChunkKey) -> Result<Bytes> {
        let row = sqlx::query(
            "SELECT data, checksum FROM stream_chunks WHERE stream_id = ?1 AND chunk_index = ?2",
        )
        .bind(key.stream_id as i64)
        .bind(key.chunk_index as i64)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(Error::ChunkNotFound {
            stream_id: key.stream_id,
            chunk_index: key.chunk_index,
        })?;

        let data: Vec<u8> = row.try_get("data")?;
        let checksum: i64 = row.try_get("checksum")?;

        if i64::from(crc32fast::hash(&data)) != checksum {
            return Err(Error::ChecksumMismatch {
                stream_id: key.stream_id,
                chunk_index: key.chunk_index,
            });
        }

        Ok(Bytes::from(data))
    }

    async fn size(&self, key: ChunkKey) -> Result<u64> {
        let row = sqlx::query(
            "SELECT length(data) AS len FROM stream_chunks WHERE stream_id = ?1 AND chunk_index = ?2",
        )
        .bind(key.stream_id as i64)
        .bind(key.chunk_index as i64)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let len: i64 = row.try_get("len")?;
                Ok(len as u64)
            }
            None => Ok(0),
        }
    }

    async fn write(&self, key: ChunkKey, data: Bytes) -> Result<u64> {
        if data.is_empty() {
            return Err(Error::Write("could not write empty data".to_string()));
        }

        let checksum = i64::from(crc32fast::hash(&data));
        let len = data.len() as u64;

        sqlx::query(
            r#"
            INSERT INTO stream_chunks (stream_id, chunk_index, data, checksum, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(stream_id, chunk_index) DO UPDATE SET
                data = excluded.data,
                checksum = excluded.checksum
            "#,
        )
        .bind(key.stream_id as i64)
        .bind(key.chunk_index as i64)
        .bind(data.to_vec())
        .bind(checksum)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;

        debug!(%key, bytes = len, "durable chunk written");

        Ok(len)
    }

    async fn append(&self, key: ChunkKey, data: Bytes, expected_len: u64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT data FROM stream_chunks WHERE stream_id = ?1 AND chunk_index = ?2",
        )
        .bind(key.stream_id as i64)
        .bind(key.chunk_index as i64)
        .fetch_optional(&mut *tx)
        .await?;

        let row = row.ok_or_else(|| {
            Error::Write(format!("could not append to missing chunk {key}"))
        })?;

        let mut merged: Vec<u8> = row.try_get("data")?;
        merged.extend_from_slice(&data);

        if merged.len() as u64 != expected_len {
            return Err(Error::Write(format!(
                "size mismatch after appending to chunk {key}: expected {expected_len}, got {}",
                merged.len()
            )));
        }

        let checksum = i64::from(crc32fast::hash(&merged));

        sqlx::query(
            "UPDATE stream_chunks SET data = ?3, checksum = ?4 WHERE stream_id = ?1 AND chunk_index = ?2",
        )
        .bind(key.stream_id as i64)
        .bind(key.chunk_index as i64)
        .bind(merged)
        .bind(checksum)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(data.len() as u64)
    }

    async fn truncate(&self, _key: ChunkKey, _len: u64) -> Result<()> {
        Err(Error::TruncateUnsupported(Tier::Durable))
    }

    async fn delete(&self, key: ChunkKey) -> Result<()> {
        sqlx::query("DELETE FROM stream_chunks WHERE stream_id = ?1 AND chunk_index = ?2")
            .bind(key.stream_id as i64)
            .bind(key.chunk_index as i64)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn chunk_count(&self, stream_id: u64) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM stream_chunks WHERE stream_id = ?1")
            .bind(stream_id as i64)
            .fetch_one(&self.pool)
            .await?;

        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }
}
