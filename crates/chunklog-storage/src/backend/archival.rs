//! Archival Tier Backend
//!
//! Read-only, network-addressed store for frozen streams. A stream's full
//! byte content lives as one blob at `<base_url>/<stream_id>`; chunk reads
//! map onto HTTP range requests:
//!
//! ```text
//! get(chunk 2)  →  GET <base>/<stream_id>
//!                  Range: bytes=<2*chunk_size>-<3*chunk_size - 1>
//! ```
//!
//! `206 Partial Content` yields the requested window directly; a server
//! that ignores the `Range` header and answers `200` with the full blob is
//! tolerated by slicing the window out locally. Every other status is
//! surfaced as `FailedToGetChunk` — a transport failure is never treated as
//! empty content. All requests carry a timeout.
//!
//! Every mutation fails with `ReadOnly`: archived streams are frozen.

use crate::backend::ChunkBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chunklog_core::{ChunkKey, ChunkLayout, Tier};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

/// HTTP-backed chunk store for the archival tier.
#[derive(Debug)]
pub struct ArchivalTierBackend {
    base_url: Url,
    layout: ChunkLayout,
    client: reqwest::Client,
}

impl ArchivalTierBackend {
    /// Build a backend rooted at `base_url`.
    ///
    /// The URL must be absolute http(s) with a host; anything else is
    /// rejected up front with `InvalidUrl` rather than at first fetch.
    pub fn new(base_url: &str, layout: ChunkLayout, request_timeout: Duration) -> Result<Self> {
        let url = Url::parse(base_url)
            .map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::InvalidUrl(format!(
                "{base_url}: scheme must be http or https"
            )));
        }
        if url.host_str().is_none() {
            return Err(Error::InvalidUrl(format!("{base_url}: missing host")));
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            base_url: url,
            layout,
            client,
        })
    }

    fn stream_url(&self, stream_id: u64) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(format!("{}: cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push(&stream_id.to_string());

        Ok(url)
    }

    fn range_header(&self, chunk_index: u64) -> String {
        let start = self.layout.chunk_start(chunk_index);
        let end = start + self.layout.chunk_size() - 1;
        format!("bytes={start}-{end}")
    }
}

#[async_trait]
impl ChunkBackend for ArchivalTierBackend {
    fn tier(&self) -> Tier {
        Tier::Archival
    }

    async fn get(&self, key: ChunkKey) -> Result<Bytes> {
        let url = self.stream_url(key.stream_id)?;
        let response = self
            .client
            .get(url)
            .header(RANGE, self.range_header(key.chunk_index))
            .send()
            .await?;

        let chunk_size = self.layout.chunk_size() as usize;
        let start = self.layout.chunk_start(key.chunk_index) as usize;

        let window = match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                let body = response.bytes().await?;
                body.slice(..body.len().min(chunk_size))
            }
            StatusCode::OK => {
                // Server ignored the Range header; slice the window locally.
                let body = response.bytes().await?;
                if start >= body.len() {
                    Bytes::new()
                } else {
                    body.slice(start..body.len().min(start + chunk_size))
                }
            }
            status => {
                return Err(Error::FailedToGetChunk {
                    status: status.as_u16(),
                })
            }
        };

        if window.is_empty() {
            return Err(Error::ChunkNotFound {
                stream_id: key.stream_id,
                chunk_index: key.chunk_index,
            });
        }

        Ok(window)
    }

    async fn size(&self, key: ChunkKey) -> Result<u64> {
        let url = self.stream_url(key.stream_id)?;
        let response = self.client.head(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::FailedToGetChunk {
                status: response.status().as_u16(),
            });
        }

        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        match total {
            Some(total) => {
                let start = self.layout.chunk_start(key.chunk_index);
                Ok(total.saturating_sub(start).min(self.layout.chunk_size()))
            }
            // No Content-Length advertised; fall back to fetching the window.
            None => match self.get(key).await {
                Ok(window) => Ok(window.len() as u64),
                Err(Error::ChunkNotFound { .. }) => Ok(0),
                Err(e) => Err(e),
            },
        }
    }

    async fn write(&self, _key: ChunkKey, _data: Bytes) -> Result<u64> {
        Err(Error::ReadOnly(Tier::Archival))
    }

    async fn append(&self, _key: ChunkKey, _data: Bytes, _expected_len: u64) -> Result<u64> {
        Err(Error::ReadOnly(Tier::Archival))
    }

    async fn truncate(&self, _key: ChunkKey, _len: u64) -> Result<()> {
        Err(Error::ReadOnly(Tier::Archival))
    }

    async fn delete(&self, _key: ChunkKey) -> Result<()> {
        Err(Error::ReadOnly(Tier::Archival))
    }

    async fn chunk_count(&self, stream_id: u64) -> Result<u64> {
        let url = self.stream_url(stream_id)?;
        let response = self.client.head(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::FailedToGetChunk {
                status: response.status().as_u16(),
            });
        }

        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        Ok(total.div_ceil(self.layout.chunk_size()))
    }
}
