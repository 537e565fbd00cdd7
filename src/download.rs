//! Audio download
//!
//! Streams episode audio from the feed's enclosure URL into the audio
//! directory. The local filename is the last path segment of the URL,
//! percent-decoded; an existing file at the destination is overwritten so
//! a rerun after a partial download starts clean.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{DownloadError, Error, Result};

/// Fetches remote audio into a local file
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` into `dest_dir`, returning the path of the written file
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// Streaming HTTP downloader
pub struct HttpDownloader {
    /// HTTP client for fetching audio
    http_client: reqwest::Client,
}

impl HttpDownloader {
    /// Create a downloader with its own HTTP client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        // Connect timeout only; reading a full episode can take minutes
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .user_agent("pod2tube downloader")
            .build()
            .map_err(Error::Network)?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let filename = audio_filename(url).ok_or_else(|| DownloadError::BadLocator {
            url: url.to_string(),
        })?;

        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(&filename);

        // Stream the body to disk chunk by chunk instead of buffering a
        // whole episode in memory
        let mut file = fs::File::create(&dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!(url, path = %dest.display(), bytes = written, "Audio downloaded");

        Ok(dest)
    }
}

/// Derive the local filename from the last path segment of the URL
///
/// The segment is percent-decoded, so `My%20Episode.mp3` lands on disk as
/// `My Episode.mp3`. Returns `None` when the URL has no usable segment.
fn audio_filename(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    let last = segments.next_back()?;
    if last.is_empty() {
        return None;
    }

    let decoded = urlencoding::decode(last).ok()?.into_owned();
    // A decoded segment must stay a bare filename
    if decoded.is_empty() || decoded.contains('/') || decoded.contains('\\') || decoded == ".." {
        return None;
    }

    Some(decoded)
}
