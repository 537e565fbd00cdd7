//! # pod2tube
//!
//! Pipeline that republishes podcast episodes as videos on an upload
//! platform.
//!
//! Each run fetches a syndication feed, works out which episodes are new
//! relative to a file-backed cursor, downloads the new audio, renders it
//! over a background image with ffmpeg, and delivers the result through a
//! resumable chunked upload with bounded, randomized-backoff retries.
//!
//! ## Design Philosophy
//!
//! pod2tube is designed to be:
//! - **Incremental** - only episodes newer than the persisted cursor are
//!   processed; runs are cheap to repeat
//! - **At-most-once** - the cursor advances at fetch time, so an interrupted
//!   run never re-uploads an episode
//! - **Resumable** - uploads continue from the last acknowledged byte after
//!   transient failures, with a bounded retry budget
//! - **Library-first** - the binary is a thin wrapper; every collaborator
//!   sits behind a trait so tests and embedders can swap it out
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pod2tube::auth;
//! use pod2tube::download::HttpDownloader;
//! use pod2tube::feed::HttpFeedSource;
//! use pod2tube::transcode::FfmpegTranscoder;
//! use pod2tube::transfer::PlatformEndpointFactory;
//! use pod2tube::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.json").await?;
//!
//!     let token = auth::load_token(&config.token_path).await?;
//!     let client = auth::authorized_client(&token)?;
//!     let transcoder = FfmpegTranscoder::from_path().ok_or("ffmpeg not found in PATH")?;
//!
//!     let pipeline = Pipeline::new(
//!         config.clone(),
//!         Arc::new(HttpFeedSource::new(&config.feed_url)?),
//!         Arc::new(HttpDownloader::new()?),
//!         Arc::new(transcoder),
//!         Arc::new(PlatformEndpointFactory::new(client, &config.api_base)),
//!     );
//!
//!     let report = pipeline.run_once().await?;
//!     println!("delivered {} episodes", report.delivered());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Platform credentials and the authorized HTTP client
pub mod auth;
/// Configuration types
pub mod config;
/// Incremental cursor over the feed
pub mod cursor;
/// Audio media download
pub mod download;
/// Error types
pub mod error;
/// Feed fetching and parsing
pub mod feed;
/// Run orchestration
pub mod pipeline;
/// Audio-to-video rendering via ffmpeg
pub mod transcode;
/// Resumable chunked transfer
pub mod transfer;
/// Core types
pub mod types;

// Re-export commonly used types
pub use auth::{StoredToken, authorized_client, load_token};
pub use config::{Config, FirstRun, OnItemFailure, TransferConfig};
pub use cursor::{CursorStore, compute_new};
pub use download::{Downloader, HttpDownloader};
pub use error::{ChunkError, DownloadError, Error, FeedError, Result, TransferError};
pub use feed::{FeedSource, HttpFeedSource};
pub use pipeline::Pipeline;
pub use transcode::{FfmpegTranscoder, Transcoder};
pub use transfer::{
    ChunkOutcome, EndpointFactory, FinalRecord, PlatformEndpointFactory, ResumableEndpoint,
    TransferEndpoint, TransferSession,
};
pub use types::{
    FeedItem, ItemOutcome, RemoteId, RunReport, Stage, TransferItem, VideoDescriptor, Visibility,
};
