//! Feed retrieval and parsing
//!
//! Fetches the podcast feed over HTTP and maps it to [`FeedItem`]s. Supports
//! both RSS 2.0 and Atom formats, trying RSS first and falling back to Atom.
//! Only entries carrying an `audio/mpeg` enclosure enter the pipeline; other
//! entries are skipped before the cursor ever sees them, so a non-episode
//! entry at the top of the feed cannot become the cursor value.

use crate::error::{Error, FeedError, Result};
use crate::types::FeedItem;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Source of feed items, newest first
///
/// The pipeline depends on identifiers being stable across fetches; an empty
/// snapshot is valid and means "nothing published yet".
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the current feed snapshot, newest first
    async fn fetch_items(&self) -> Result<Vec<FeedItem>>;
}

/// Fetches and parses a syndication feed over HTTP
pub struct HttpFeedSource {
    /// HTTP client for fetching the feed
    http_client: reqwest::Client,

    /// The feed URL
    url: String,
}

impl HttpFeedSource {
    /// Create a feed source for the given URL
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(url: impl Into<String>) -> Result<Self> {
        // 30 second timeout keeps a hung feed server from stalling the run
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("pod2tube feed reader")
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_items(&self) -> Result<Vec<FeedItem>> {
        debug!("Checking feed: {}", self.url);

        let response = self.http_client.get(&self.url).send().await?;

        // Check HTTP status before trying to parse the response body
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Http {
                url: self.url.clone(),
                status: status.as_u16(),
            }
            .into());
        }

        let content = response.text().await?;

        // Try parsing as RSS first, then Atom
        match parse_as_rss(&content) {
            Ok(items) => {
                debug!("Successfully parsed as RSS, found {} items", items.len());
                Ok(items)
            }
            Err(rss_err) => {
                debug!("Failed to parse as RSS: {}, trying Atom", rss_err);
                match parse_as_atom(&content) {
                    Ok(items) => {
                        debug!("Successfully parsed as Atom, found {} items", items.len());
                        Ok(items)
                    }
                    Err(atom_err) => Err(FeedError::Parse(format!(
                        "RSS error: {rss_err}. Atom error: {atom_err}"
                    ))
                    .into()),
                }
            }
        }
    }
}

/// Parse feed content as RSS
fn parse_as_rss(content: &str) -> std::result::Result<Vec<FeedItem>, rss::Error> {
    let channel = content.parse::<rss::Channel>()?;

    let items = channel
        .items()
        .iter()
        .filter_map(|item| {
            // An episode must carry an audio/mpeg enclosure; anything else
            // (announcements, video entries) never enters the pipeline
            let Some(audio_url) = item
                .enclosure()
                .filter(|enc| enc.mime_type() == "audio/mpeg")
                .map(|enc| enc.url().to_string())
            else {
                warn!(
                    title = item.title().unwrap_or(""),
                    "Feed entry has no audio enclosure, skipping"
                );
                return None;
            };

            // Identifier: prefer guid, fall back to link, then title
            let id = item
                .guid()
                .map(|g| g.value().to_string())
                .or_else(|| item.link().map(str::to_string))
                .or_else(|| item.title().map(str::to_string))
                .unwrap_or_default();
            if id.is_empty() {
                warn!("Feed entry has no usable identifier, skipping");
                return None;
            }

            Some(FeedItem {
                id,
                title: item.title().unwrap_or("").to_string(),
                description: item.description().unwrap_or("").to_string(),
                audio_url,
            })
        })
        .collect();

    Ok(items)
}

/// Parse feed content as Atom
fn parse_as_atom(content: &str) -> std::result::Result<Vec<FeedItem>, atom_syndication::Error> {
    let feed = atom_syndication::Feed::read_from(content.as_bytes())?;

    let items = feed
        .entries()
        .iter()
        .filter_map(|entry| {
            let Some(audio_url) = entry
                .links()
                .iter()
                .find(|link| link.mime_type() == Some("audio/mpeg"))
                .map(|link| link.href().to_string())
            else {
                warn!(
                    title = entry.title().as_str(),
                    "Feed entry has no audio link, skipping"
                );
                return None;
            };

            // Description from summary or content
            let description = entry
                .summary()
                .map(|s| s.as_str().to_string())
                .or_else(|| entry.content().and_then(|c| c.value().map(String::from)))
                .unwrap_or_default();

            Some(FeedItem {
                id: entry.id().to_string(),
                title: entry.title().as_str().to_string(),
                description,
                audio_url,
            })
        })
        .collect();

    Ok(items)
}
