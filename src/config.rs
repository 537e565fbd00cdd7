//! Configuration types for pod2tube

use crate::error::{Error, Result};
use crate::types::Visibility;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the pipeline
///
/// Only `feed_url` is required; every other field has a default mirroring the
/// behavior of a bare setup (relative `audios`/`videos` directories, a `.last`
/// cursor file next to the binary, private uploads).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Syndication feed to poll (required)
    pub feed_url: String,

    /// Directory for downloaded audio files (default: "audios")
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,

    /// Directory for transcoded video files (default: "videos")
    #[serde(default = "default_video_dir")]
    pub video_dir: PathBuf,

    /// Cursor token file (default: ".last")
    #[serde(default = "default_cursor_path")]
    pub cursor_path: PathBuf,

    /// Background asset for the transcode step (default: "background.gif")
    ///
    /// A `.gif` extension selects the animated-loop encode; anything else is
    /// treated as a still image.
    #[serde(default = "default_background_image")]
    pub background_image: PathBuf,

    /// Bearer-token file for the platform (default: "token.json")
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    /// Path to ffmpeg executable (auto-detected via PATH if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Visibility applied to delivered videos (default: private)
    #[serde(default)]
    pub visibility: Visibility,

    /// Platform category code (default: "22")
    #[serde(default = "default_category")]
    pub category: String,

    /// Keyword list attached to delivered videos (default: none)
    #[serde(default)]
    pub tags: Vec<String>,

    /// Base URL of the platform's resumable upload API
    ///
    /// Overridable so tests can point the pipeline at a local mock server.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Upload retry/backoff and chunking settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// What counts as "new" when no cursor exists yet (default: process_all)
    #[serde(default)]
    pub first_run: FirstRun,

    /// Whether a failed upload aborts the remaining batch (default: abort)
    #[serde(default)]
    pub on_item_failure: OnItemFailure,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: String::new(),
            audio_dir: default_audio_dir(),
            video_dir: default_video_dir(),
            cursor_path: default_cursor_path(),
            background_image: default_background_image(),
            token_path: default_token_path(),
            ffmpeg_path: None,
            visibility: Visibility::default(),
            category: default_category(),
            tags: Vec::new(),
            api_base: default_api_base(),
            transfer: TransferConfig::default(),
            first_run: FirstRun::default(),
            on_item_failure: OnItemFailure::default(),
        }
    }
}

/// Upload retry, backoff, and chunking configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Maximum number of retry attempts per upload session (default: 10)
    ///
    /// Bounds attempts, not wall-clock time: each retry waits
    /// `random(0,1) * 2^retries` seconds before the next attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// HTTP statuses treated as transient (default: 500, 502, 503, 504)
    ///
    /// Any other remote status fails the session immediately. Transport-level
    /// errors without a status are always retried.
    #[serde(default = "default_retriable_statuses")]
    pub retriable_statuses: Vec<u16>,

    /// Upload chunk size in bytes (default: 8 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retriable_statuses: default_retriable_statuses(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Policy for the first-ever run, when no cursor file exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstRun {
    /// The entire current feed window is new (default)
    #[default]
    ProcessAll,
    /// Nothing is new; record the newest identifier and start watching from
    /// the next run
    WatchOnly,
}

/// Policy for a terminal upload failure mid-batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnItemFailure {
    /// Stop the run at the first failed upload; later items are reported as
    /// skipped (default)
    #[default]
    Abort,
    /// Log the failure and keep processing the remaining items
    Continue,
}

impl Config {
    /// Load configuration from a JSON file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config {
                message: format!("failed to read config file '{}': {}", path.display(), e),
                key: None,
            }
        })?;
        let config: Config = serde_json::from_str(&contents).map_err(|e| Error::Config {
            message: format!("failed to parse config file '{}': {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings that serde cannot enforce
    ///
    /// Called before any I/O so a bad value aborts the run before any item is
    /// touched.
    pub fn validate(&self) -> Result<()> {
        if self.feed_url.is_empty() {
            return Err(Error::Config {
                message: "feed_url must not be empty".into(),
                key: Some("feed_url".into()),
            });
        }
        if url::Url::parse(&self.feed_url).is_err() {
            return Err(Error::Config {
                message: format!("feed_url '{}' is not a valid URL", self.feed_url),
                key: Some("feed_url".into()),
            });
        }
        if url::Url::parse(&self.api_base).is_err() {
            return Err(Error::Config {
                message: format!("api_base '{}' is not a valid URL", self.api_base),
                key: Some("api_base".into()),
            });
        }
        if self.transfer.chunk_size == 0 {
            return Err(Error::Config {
                message: "transfer.chunk_size must be greater than zero".into(),
                key: Some("transfer.chunk_size".into()),
            });
        }
        Ok(())
    }
}

// Default value functions
fn default_audio_dir() -> PathBuf {
    PathBuf::from("audios")
}

fn default_video_dir() -> PathBuf {
    PathBuf::from("videos")
}

fn default_cursor_path() -> PathBuf {
    PathBuf::from(".last")
}

fn default_background_image() -> PathBuf {
    PathBuf::from("background.gif")
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_category() -> String {
    "22".into()
}

fn default_api_base() -> String {
    "https://www.googleapis.com/upload/youtube/v3".into()
}

fn default_max_retries() -> u32 {
    10
}

fn default_retriable_statuses() -> Vec<u16> {
    vec![500, 502, 503, 504]
}

fn default_chunk_size() -> u64 {
    8 * 1024 * 1024 // 8 MiB
}
