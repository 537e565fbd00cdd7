//! Error types for pod2tube
//!
//! This module provides comprehensive error handling for the pipeline, including:
//! - Fatal setup errors (configuration, credentials) that abort a run before
//!   any item is touched
//! - Per-item stage errors (feed entry mapping, download, transcode)
//! - Transfer-level errors split into per-attempt failures ([`ChunkError`],
//!   classified retriable or not) and terminal session outcomes
//!   ([`TransferError`])

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pod2tube operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pod2tube
///
/// This is the primary error type used throughout the crate. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "feed_url")
        key: Option<String>,
    },

    /// Credential loading failed (missing or malformed token file)
    #[error("credential error: {0}")]
    Credentials(String),

    /// Feed retrieval or parsing failed
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// Media download failed
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Upload session terminal failure
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Cursor file could not be written
    ///
    /// Fatal: continuing after a failed cursor write would re-deliver the
    /// whole batch on the next run.
    #[error("cursor error: failed to write {path}: {reason}")]
    CursorWrite {
        /// The cursor file that could not be written
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),
}

/// Feed-related errors
#[derive(Debug, Error)]
pub enum FeedError {
    /// Feed endpoint returned a non-success status
    #[error("feed {url} returned HTTP {status}")]
    Http {
        /// The feed URL that was fetched
        url: String,
        /// The HTTP status the feed endpoint returned
        status: u16,
    },

    /// Body parsed as neither RSS nor Atom
    #[error("failed to parse feed as RSS or Atom: {0}")]
    Parse(String),
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Media endpoint returned a non-success status
    #[error("media URL {url} returned HTTP {status}")]
    Http {
        /// The media URL that was requested
        url: String,
        /// The HTTP status the media endpoint returned
        status: u16,
    },

    /// No usable filename could be derived from the media URL
    #[error("cannot derive a local filename from {url}")]
    BadLocator {
        /// The media URL lacking a usable final path segment
        url: String,
    },
}

/// Terminal outcomes of an upload session
///
/// These are the reasons a session ends in `Failed`. A direct remote rejection
/// is kept distinct from an exhausted retry budget so operators can tell "the
/// platform said no" apart from "the network never recovered".
#[derive(Debug, Error)]
pub enum TransferError {
    /// Remote endpoint answered a chunk with a non-retriable status
    #[error("upload rejected by remote endpoint with HTTP {status}")]
    Rejected {
        /// The non-retriable HTTP status the endpoint returned
        status: u16,
    },

    /// Retry budget exhausted on retriable errors
    #[error("upload abandoned after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Total chunk attempts made, including the first
        attempts: u32,
        /// Display form of the last retriable error observed
        last_error: String,
    },

    /// The endpoint violated the protocol (e.g., a final record without a
    /// remote identifier, or a session initiation without a session URI)
    #[error("unexpected response from remote endpoint: {0}")]
    UnexpectedResponse(String),
}

/// Per-attempt failures reported by the transfer endpoint
///
/// A single chunk exchange either carries a remote HTTP status (classified
/// against the configured retriable set) or failed at the transport level
/// before any status arrived (always retriable).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    /// Remote endpoint answered with an unexpected HTTP status
    #[error("remote endpoint returned HTTP {status}")]
    Status {
        /// The HTTP status the endpoint returned
        status: u16,
    },

    /// Transport-level failure with no remote status (connection reset,
    /// timeout, DNS failure)
    #[error("transport error: {0}")]
    Transport(String),
}

impl ChunkError {
    /// Classify this error against the configured retriable status set.
    ///
    /// Transport errors never carry a remote status and are always retriable;
    /// a remote status is retriable only if it appears in `retriable_statuses`.
    pub fn is_retriable(&self, retriable_statuses: &[u16]) -> bool {
        match self {
            ChunkError::Status { status } => retriable_statuses.contains(status),
            ChunkError::Transport(_) => true,
        }
    }
}
