//! Resumable chunked transfer
//!
//! One [`TransferSession`] delivers one local artifact to the remote
//! platform. The artifact flows as a sequence of byte windows through a
//! [`TransferEndpoint`]; the endpoint acknowledges progress and eventually
//! closes the session with a final record carrying the remote identifier.
//!
//! The session owns retry state: errors the endpoint classifies as
//! transient (a configured status set, plus every transport-level failure)
//! are retried with randomized exponential backoff, bounded by a configured
//! retry budget that spans the whole session. The state machine lives in
//! the control flow of [`TransferSession::run`]: construction is
//! `Initialized`, the send loop is `Sending`, and the function returns
//! only from a terminal state.
//!
//! ## Usage
//!
//! ```no_run
//! use pod2tube::config::TransferConfig;
//! use pod2tube::transfer::{ResumableEndpoint, TransferSession};
//! use std::path::Path;
//!
//! # async fn example(endpoint: ResumableEndpoint) -> Result<(), Box<dyn std::error::Error>> {
//! let config = TransferConfig::default();
//! let session = TransferSession::new(&endpoint, &config);
//! let remote_id = session.run(Path::new("videos/episode.mp4")).await?;
//! println!("published as {remote_id}");
//! # Ok(())
//! # }
//! ```

mod endpoint;

pub use endpoint::{ChunkOutcome, FinalRecord, ResumableEndpoint, TransferEndpoint};

use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use rand::Rng;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error, info, warn};

use async_trait::async_trait;

use crate::config::TransferConfig;
use crate::error::{ChunkError, Error, Result, TransferError};
use crate::types::{RemoteId, VideoDescriptor};

/// One resumable upload, driven to a terminal state
pub struct TransferSession<'a> {
    /// Wire-level collaborator the chunks flow through
    endpoint: &'a dyn TransferEndpoint,

    /// Retry budget, retriable status set, and chunk size
    config: &'a TransferConfig,
}

impl<'a> TransferSession<'a> {
    /// Create a session over an already-initiated endpoint
    pub fn new(endpoint: &'a dyn TransferEndpoint, config: &'a TransferConfig) -> Self {
        Self { endpoint, config }
    }

    /// Drive the upload until the session completes or fails
    ///
    /// Does not return until a terminal state is reached; backoff waits
    /// happen inside this call. The retry budget bounds attempts, not
    /// wall-clock time.
    ///
    /// # Errors
    /// [`TransferError::Rejected`] on a non-retriable remote status,
    /// [`TransferError::RetriesExhausted`] when the retry budget is spent,
    /// [`TransferError::UnexpectedResponse`] on a protocol violation, or an
    /// I/O error reading the artifact.
    pub async fn run(&self, artifact: &Path) -> Result<RemoteId> {
        let mut file = fs::File::open(artifact).await?;
        let total = file.metadata().await?.len();
        if total == 0 {
            return Err(Error::NotSupported(format!(
                "cannot transfer empty artifact {}",
                artifact.display()
            )));
        }

        info!(
            artifact = %artifact.display(),
            total_bytes = total,
            "Transfer session started"
        );

        let mut offset: u64 = 0;
        let mut retry_count: u32 = 0;

        loop {
            if offset >= total {
                // Every byte is confirmed but the endpoint never finalized
                return Err(TransferError::UnexpectedResponse(format!(
                    "endpoint confirmed {offset} of {total} bytes without a final record"
                ))
                .into());
            }

            let chunk = read_window(&mut file, offset, self.config.chunk_size, total).await?;

            match self.endpoint.send_chunk(offset, &chunk, total).await {
                Ok(ChunkOutcome::Progress { bytes_confirmed }) => {
                    debug!(bytes_confirmed, total_bytes = total, "Chunk acknowledged");
                    // Resume exactly where the endpoint reports; acknowledged
                    // bytes are never resent
                    offset = bytes_confirmed;
                }
                Ok(ChunkOutcome::Final(record)) => {
                    let Some(id) = record.id else {
                        error!("Final record carries no remote identifier");
                        return Err(TransferError::UnexpectedResponse(
                            "final record carries no remote identifier".to_string(),
                        )
                        .into());
                    };
                    info!(remote_id = %id, "Transfer completed");
                    return Ok(RemoteId::new(id));
                }
                Err(e)
                    if e.is_retriable(&self.config.retriable_statuses)
                        && retry_count < self.config.max_retries =>
                {
                    retry_count += 1;
                    let delay = backoff_delay(retry_count);
                    warn!(
                        error = %e,
                        attempt = retry_count,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis(),
                        "Chunk failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(self.terminal_error(e, retry_count)),
            }
        }
    }

    /// Map a chunk error that ends the session onto the terminal reason
    fn terminal_error(&self, err: ChunkError, retry_count: u32) -> Error {
        match err {
            ChunkError::Status { status }
                if !self.config.retriable_statuses.contains(&status) =>
            {
                error!(status, "Transfer rejected by the endpoint");
                TransferError::Rejected { status }.into()
            }
            err => {
                // Retriable error with the retry budget spent
                error!(
                    error = %err,
                    attempts = retry_count + 1,
                    "Transfer retries exhausted"
                );
                TransferError::RetriesExhausted {
                    attempts: retry_count + 1,
                    last_error: err.to_string(),
                }
                .into()
            }
        }
    }
}

/// Read the byte window at `offset`, at most `chunk_size` bytes
async fn read_window(
    file: &mut fs::File,
    offset: u64,
    chunk_size: u64,
    total: u64,
) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset)).await?;
    let window = chunk_size.min(total - offset) as usize;
    let mut buf = vec![0u8; window];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Randomized exponential backoff: `random(0,1) * 2^retry_count` seconds
fn backoff_delay(retry_count: u32) -> Duration {
    let mut rng = rand::thread_rng();
    let factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(factor * max_backoff_secs(retry_count))
}

/// Upper bound of the backoff window for a retry count
fn max_backoff_secs(retry_count: u32) -> f64 {
    // Clamped exponent keeps the duration finite for any configured limit
    2f64.powi(retry_count.min(30) as i32)
}

/// Opens a wire endpoint for one upload session
///
/// The seam between the pipeline and the platform API: production code opens
/// [`ResumableEndpoint`]s, tests substitute scripted endpoints.
#[async_trait]
pub trait EndpointFactory: Send + Sync {
    /// Initiate a session for an artifact of `total_bytes`, described by
    /// `descriptor`
    async fn open(
        &self,
        descriptor: &VideoDescriptor,
        total_bytes: u64,
    ) -> Result<Box<dyn TransferEndpoint>>;
}

/// Factory that initiates [`ResumableEndpoint`] sessions against the
/// platform API
pub struct PlatformEndpointFactory {
    /// Authorized HTTP client shared by every session
    http_client: reqwest::Client,

    /// Base URL initiation requests are posted under
    api_base: String,
}

impl PlatformEndpointFactory {
    /// Create a factory over an already-authorized client
    pub fn new(http_client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http_client,
            api_base: api_base.into(),
        }
    }
}

#[async_trait]
impl EndpointFactory for PlatformEndpointFactory {
    async fn open(
        &self,
        descriptor: &VideoDescriptor,
        total_bytes: u64,
    ) -> Result<Box<dyn TransferEndpoint>> {
        let endpoint = ResumableEndpoint::initiate(
            self.http_client.clone(),
            &self.api_base,
            descriptor,
            total_bytes,
        )
        .await?;
        Ok(Box::new(endpoint))
    }
}
