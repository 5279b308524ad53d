//! Tests for the archival tier against a real loopback HTTP server.
//!
//! The server holds one stream blob and answers range requests the way an
//! object store front-end does; a second variant deliberately ignores the
//! `Range` header to exercise the 200-with-full-body fallback.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use chunklog_core::{ChunkKey, ChunkLayout};
use chunklog_storage::{ArchivalTierBackend, ChunkBackend, ChunkStorage, Error, StorageConfig};
use std::io::SeekFrom;
use std::net::SocketAddr;
use std::time::Duration;

const BLOB: &[u8] = b"ABCDEFGHI";

#[derive(Clone)]
struct Blob(Bytes);

fn parse_range(headers: &HeaderMap) -> Option<(usize, usize)> {
    let spec = headers.get(header::RANGE)?.to_str().ok()?;
    let spec = spec.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

async fn ranged_blob(State(blob): State<Blob>, headers: HeaderMap) -> Response {
    match parse_range(&headers) {
        Some((start, end)) => {
            if start >= blob.0.len() {
                return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            }
            let end = end.min(blob.0.len() - 1);
            (StatusCode::PARTIAL_CONTENT, blob.0.slice(start..end + 1)).into_response()
        }
        None => (StatusCode::OK, blob.0.clone()).into_response(),
    }
}

/// Pretends `Range` does not exist, as some blob front-ends do.
async fn whole_blob(State(blob): State<Blob>) -> Response {
    (StatusCode::OK, blob.0.clone()).into_response()
}

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn ranged_server() -> SocketAddr {
    let app = Router::new()
        .route("/traces/:id", get(ranged_blob))
        .with_state(Blob(Bytes::from_static(BLOB)));
    spawn_server(app).await
}

fn layout() -> ChunkLayout {
    ChunkLayout::new(4).unwrap()
}

fn timeout() -> Duration {
    Duration::from_secs(2)
}

#[tokio::test]
async fn test_archived_stream_round_trip() {
    let addr = ranged_server().await;

    let config = StorageConfig {
        chunk_size: 4,
        archive_base_url: Some(format!("http://{addr}/traces")),
        ..Default::default()
    };
    let storage = ChunkStorage::from_config(config).await.unwrap();

    let mut stream = storage.open_archived(42, BLOB.len() as u64).await.unwrap();
    assert_eq!(stream.read_to_end().await.unwrap(), Bytes::from_static(BLOB));

    // Range-mapped seeks work the same as on live streams.
    stream.seek(SeekFrom::Start(5)).unwrap();
    assert_eq!(stream.read(3).await.unwrap(), Bytes::from_static(b"FGH"));

    stream.seek(SeekFrom::Start(2)).unwrap();
    assert_eq!(stream.read_line().await.unwrap(), Bytes::from_static(b"CDEFGHI"));
}

#[tokio::test]
async fn test_backend_fetches_each_chunk_window() {
    let addr = ranged_server().await;
    let backend = ArchivalTierBackend::new(
        &format!("http://{addr}/traces"),
        layout(),
        timeout(),
    )
    .unwrap();

    assert_eq!(
        backend.get(ChunkKey::new(42, 0)).await.unwrap(),
        Bytes::from_static(b"ABCD")
    );
    assert_eq!(
        backend.get(ChunkKey::new(42, 2)).await.unwrap(),
        Bytes::from_static(b"I")
    );
}

#[tokio::test]
async fn test_backend_sizes_derive_from_content_length() {
    let addr = ranged_server().await;
    let backend = ArchivalTierBackend::new(
        &format!("http://{addr}/traces"),
        layout(),
        timeout(),
    )
    .unwrap();

    assert_eq!(backend.size(ChunkKey::new(42, 0)).await.unwrap(), 4);
    assert_eq!(backend.size(ChunkKey::new(42, 2)).await.unwrap(), 1);
    assert_eq!(backend.size(ChunkKey::new(42, 5)).await.unwrap(), 0);
    assert_eq!(backend.chunk_count(42).await.unwrap(), 3);
}

#[tokio::test]
async fn test_server_ignoring_range_still_yields_chunk_windows() {
    let app = Router::new()
        .route("/traces/:id", get(whole_blob))
        .with_state(Blob(Bytes::from_static(BLOB)));
    let addr = spawn_server(app).await;

    let backend = ArchivalTierBackend::new(
        &format!("http://{addr}/traces"),
        layout(),
        timeout(),
    )
    .unwrap();

    assert_eq!(
        backend.get(ChunkKey::new(42, 1)).await.unwrap(),
        Bytes::from_static(b"EFGH")
    );
    assert_eq!(
        backend.get(ChunkKey::new(42, 2)).await.unwrap(),
        Bytes::from_static(b"I")
    );
}

#[tokio::test]
async fn test_non_2xx_surfaces_as_failed_fetch() {
    let addr = ranged_server().await;

    // Nothing routes /missing, so the server answers 404.
    let backend = ArchivalTierBackend::new(
        &format!("http://{addr}/missing"),
        layout(),
        timeout(),
    )
    .unwrap();

    let err = backend.get(ChunkKey::new(42, 0)).await.unwrap_err();
    assert!(matches!(err, Error::FailedToGetChunk { status: 404 }));
}

#[tokio::test]
async fn test_read_past_the_blob_is_chunk_not_found() {
    let addr = ranged_server().await;
    let backend = ArchivalTierBackend::new(
        &format!("http://{addr}/traces"),
        layout(),
        timeout(),
    )
    .unwrap();

    // Chunk 5 starts at offset 20, past the nine-byte blob; the server
    // rejects the range, which must not read as empty content.
    let err = backend.get(ChunkKey::new(42, 5)).await.unwrap_err();
    assert!(matches!(err, Error::FailedToGetChunk { status: 416 }));
}

#[tokio::test]
async fn test_open_archived_without_archive_configured() {
    let storage = ChunkStorage::from_config(StorageConfig {
        chunk_size: 4,
        ..Default::default()
    })
    .await
    .unwrap();

    let err = storage.open_archived(42, 9).await.unwrap_err();
    assert!(matches!(err, Error::ArchiveUnavailable));
}
