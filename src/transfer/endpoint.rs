//! Resumable upload wire protocol
//!
//! Speaks the platform's two-phase protocol: a metadata `POST` opens the
//! session and names a session URI in the `Location` header; the artifact
//! then flows through `PUT` requests with `Content-Range` headers. Status
//! `308` acknowledges bytes, `200`/`201` closes the session with a final
//! record. Everything else surfaces as a typed [`ChunkError`] for the
//! session to classify.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChunkError, Result, TransferError};
use crate::types::VideoDescriptor;

/// Outcome of one chunk exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Bytes acknowledged; more chunks remain
    Progress {
        /// Total bytes the endpoint confirmed holding
        bytes_confirmed: u64,
    },
    /// The endpoint closed the session
    Final(FinalRecord),
}

/// Record the endpoint returns when it completes a session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FinalRecord {
    /// Remote identifier of the created resource; a record without one is a
    /// protocol violation handled by the session
    pub id: Option<String>,
}

/// One side of the chunked exchange
///
/// The session hands over a byte window; the endpoint answers with progress,
/// a final record, or a classifiable error.
#[async_trait]
pub trait TransferEndpoint: Send + Sync {
    /// Send the window starting at `offset` out of `total` artifact bytes
    async fn send_chunk(
        &self,
        offset: u64,
        data: &[u8],
        total: u64,
    ) -> std::result::Result<ChunkOutcome, ChunkError>;
}

/// Metadata body for session initiation
#[derive(Serialize)]
struct UploadMetadata<'a> {
    snippet: Snippet<'a>,
    status: UploadStatus<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    category_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadStatus<'a> {
    privacy_status: &'a str,
}

/// Production endpoint bound to one upload session
#[derive(Debug)]
pub struct ResumableEndpoint {
    /// Pre-authorized HTTP client
    http_client: reqwest::Client,

    /// Session URI returned by the initiation request
    session_uri: String,
}

impl ResumableEndpoint {
    /// Open an upload session for one artifact
    ///
    /// Posts the descriptor as platform metadata; the `Location` header of
    /// the response is the session URI all chunks are sent to.
    ///
    /// # Errors
    /// Returns [`TransferError::Rejected`] if the platform refuses the
    /// initiation, [`TransferError::UnexpectedResponse`] if the response
    /// carries no `Location` header.
    pub async fn initiate(
        http_client: reqwest::Client,
        api_base: &str,
        descriptor: &VideoDescriptor,
        total_bytes: u64,
    ) -> Result<Self> {
        let url = format!("{api_base}/videos?uploadType=resumable&part=snippet,status");

        let metadata = UploadMetadata {
            snippet: Snippet {
                title: &descriptor.title,
                description: &descriptor.description,
                tags: &descriptor.tags,
                category_id: &descriptor.category,
            },
            status: UploadStatus {
                privacy_status: descriptor.visibility.as_str(),
            },
        };

        let response = http_client
            .post(&url)
            .header("X-Upload-Content-Length", total_bytes)
            .header("X-Upload-Content-Type", "video/*")
            .json(&metadata)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Rejected {
                status: status.as_u16(),
            }
            .into());
        }

        let session_uri = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                TransferError::UnexpectedResponse(
                    "initiation response carries no Location header".to_string(),
                )
            })?;

        debug!(session_uri, "Upload session opened");

        Ok(Self {
            http_client,
            session_uri,
        })
    }
}

#[async_trait]
impl TransferEndpoint for ResumableEndpoint {
    async fn send_chunk(
        &self,
        offset: u64,
        data: &[u8],
        total: u64,
    ) -> std::result::Result<ChunkOutcome, ChunkError> {
        // A Content-Range cannot express an empty window
        if data.is_empty() {
            return Err(ChunkError::Transport(
                "refusing to send an empty chunk".to_string(),
            ));
        }

        let end = offset + data.len() as u64 - 1;
        let content_range = format!("bytes {offset}-{end}/{total}");

        let response = self
            .http_client
            .put(&self.session_uri)
            .header(reqwest::header::CONTENT_RANGE, content_range)
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| ChunkError::Transport(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            // Resume incomplete: the Range header reports what the endpoint holds
            308 => {
                let bytes_confirmed = response
                    .headers()
                    .get(reqwest::header::RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_confirmed_bytes)
                    .unwrap_or(0);
                Ok(ChunkOutcome::Progress { bytes_confirmed })
            }
            200 | 201 => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| ChunkError::Transport(e.to_string()))?;
                // An unparseable record is handled like a record without an
                // identifier: terminal at the session, not retried
                let record =
                    serde_json::from_slice(&body).unwrap_or(FinalRecord { id: None });
                Ok(ChunkOutcome::Final(record))
            }
            code => Err(ChunkError::Status { status: code }),
        }
    }
}

/// Parse a `Range: bytes=0-{n}` header into a confirmed byte count
///
/// The header names the last byte index the endpoint holds, so `n + 1`
/// bytes are confirmed.
fn parse_confirmed_bytes(value: &str) -> Option<u64> {
    let (_, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    let last_byte: u64 = end.trim().parse().ok()?;
    Some(last_byte + 1)
}
