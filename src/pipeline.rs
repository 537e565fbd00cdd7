//! One pass of the feed-to-platform pipeline
//!
//! [`Pipeline::run_once`] performs a single pass: fetch the feed, work out
//! which items are new relative to the persisted cursor, advance the cursor,
//! then take each new item oldest-first through download, transcode, and a
//! transfer session. The cursor moves at fetch time, before any delivery, so
//! an interrupted run never re-uploads on the next pass; items the run never
//! reached stay behind the cursor and need manual recovery.
//!
//! Collaborators come in as trait objects. Production wiring lives in the
//! binary; tests substitute fakes for the network, the transcoder, and the
//! platform API.

use std::sync::Arc;

use tokio::fs;
use tracing::{error, info, warn};

use crate::config::{Config, OnItemFailure};
use crate::cursor::{CursorStore, compute_new};
use crate::download::Downloader;
use crate::error::Result;
use crate::feed::FeedSource;
use crate::transcode::Transcoder;
use crate::transfer::{EndpointFactory, TransferSession};
use crate::types::{
    FeedItem, ItemOutcome, RemoteId, RunReport, Stage, TransferItem, VideoDescriptor,
};

/// Orchestrates one full feed-to-platform pass
pub struct Pipeline {
    config: Config,
    feed: Arc<dyn FeedSource>,
    downloader: Arc<dyn Downloader>,
    transcoder: Arc<dyn Transcoder>,
    endpoints: Arc<dyn EndpointFactory>,
    cursor: CursorStore,
}

impl Pipeline {
    /// Wire a pipeline over its collaborators
    ///
    /// The cursor store is built from `config.cursor_path`; everything else
    /// is injected.
    pub fn new(
        config: Config,
        feed: Arc<dyn FeedSource>,
        downloader: Arc<dyn Downloader>,
        transcoder: Arc<dyn Transcoder>,
        endpoints: Arc<dyn EndpointFactory>,
    ) -> Self {
        let cursor = CursorStore::new(config.cursor_path.clone());
        Self {
            config,
            feed,
            downloader,
            transcoder,
            endpoints,
            cursor,
        }
    }

    /// Perform exactly one pass over the feed
    ///
    /// Per-item failures land in the returned [`RunReport`], governed by the
    /// `on_item_failure` policy.
    ///
    /// # Errors
    /// Returns an error only for run-level faults: the feed cannot be
    /// fetched, or the cursor cannot be written. A cursor write failure
    /// aborts before any delivery; delivering on a stale cursor would
    /// re-upload the whole batch next run.
    pub async fn run_once(&self) -> Result<RunReport> {
        // Phase 1: fetch the feed snapshot and decide what is new
        let items = self.feed.fetch_items().await?;
        let cursor = self.cursor.load().await;
        let new_items = compute_new(&items, cursor.as_deref(), self.config.first_run);

        info!(
            feed_items = items.len(),
            new_items = new_items.len(),
            "Feed checked"
        );

        // Phase 2: advance the cursor to the newest item, even when nothing
        // is new, so it tracks feed drift. Happens before any delivery.
        if let Some(newest) = items.first() {
            self.cursor.advance(&newest.id).await?;
        }

        if new_items.is_empty() {
            return Ok(RunReport::default());
        }

        // Phase 3: deliver oldest-first, so an interrupted run leaves the
        // platform's chronology matching the feed's
        let mut report = RunReport {
            new_items: new_items.len(),
            outcomes: Vec::with_capacity(new_items.len()),
        };
        let mut aborted = false;

        for item in new_items.iter().rev() {
            if aborted {
                report.outcomes.push(ItemOutcome::Skipped {
                    id: item.id.clone(),
                });
                continue;
            }

            let outcome = self.process_item(item).await;
            if matches!(outcome, ItemOutcome::Failed { .. })
                && self.config.on_item_failure == OnItemFailure::Abort
            {
                aborted = true;
            }
            report.outcomes.push(outcome);
        }

        info!(
            delivered = report.delivered(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Run finished"
        );
        Ok(report)
    }

    /// Take one feed item through download, transcode, transfer, cleanup
    async fn process_item(&self, item: &FeedItem) -> ItemOutcome {
        info!(item = %item.id, title = %item.title, "Processing item");

        // Phase 1: download the raw audio
        let audio_path = match self
            .downloader
            .fetch(&item.audio_url, &self.config.audio_dir)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                error!(item = %item.id, error = %e, "Download failed");
                return ItemOutcome::Failed {
                    id: item.id.clone(),
                    stage: Stage::Download,
                    reason: e.to_string(),
                };
            }
        };

        // Phase 2: render the video over the configured background
        let video_path = match self
            .transcoder
            .render(&audio_path, &self.config.background_image, &self.config.video_dir)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                error!(item = %item.id, error = %e, "Transcode failed");
                return ItemOutcome::Failed {
                    id: item.id.clone(),
                    stage: Stage::Transcode,
                    reason: e.to_string(),
                };
            }
        };

        // Phase 3: deliver through a transfer session
        let transfer_item = TransferItem {
            item: item.clone(),
            audio_path,
            video_path,
            descriptor: self.descriptor_for(item),
        };
        match self.deliver(&transfer_item).await {
            Ok(remote_id) => {
                self.cleanup(&transfer_item).await;
                ItemOutcome::Delivered {
                    id: item.id.clone(),
                    remote_id,
                }
            }
            Err(e) => {
                // Artifacts stay on disk for manual inspection
                error!(item = %item.id, error = %e, "Transfer failed");
                ItemOutcome::Failed {
                    id: item.id.clone(),
                    stage: Stage::Transfer,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Open a session for the item's video artifact and drive it to the end
    async fn deliver(&self, item: &TransferItem) -> Result<RemoteId> {
        let total_bytes = fs::metadata(&item.video_path).await?.len();
        let endpoint = self.endpoints.open(&item.descriptor, total_bytes).await?;
        TransferSession::new(endpoint.as_ref(), &self.config.transfer)
            .run(&item.video_path)
            .await
    }

    /// Platform metadata for one item: title and description from the feed,
    /// the rest from configuration
    fn descriptor_for(&self, item: &FeedItem) -> VideoDescriptor {
        VideoDescriptor {
            title: item.title.clone(),
            description: item.description.clone(),
            tags: self.config.tags.clone(),
            category: self.config.category.clone(),
            visibility: self.config.visibility,
        }
    }

    /// Remove a delivered item's local artifacts
    ///
    /// Removal failures are logged, not surfaced: the item is already on the
    /// platform, so a leftover file must not fail the run.
    async fn cleanup(&self, item: &TransferItem) {
        for path in [&item.audio_path, &item.video_path] {
            if let Err(e) = fs::remove_file(path).await {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not remove delivered artifact"
                );
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::config::FirstRun;
    use crate::error::{ChunkError, DownloadError, Error};
    use crate::transfer::{ChunkOutcome, FinalRecord, TransferEndpoint};
    use crate::types::Visibility;

    fn item(id: &str) -> FeedItem {
        FeedItem {
            id: id.to_string(),
            title: format!("Episode {id}"),
            description: format!("About {id}"),
            audio_url: format!("https://example.com/{id}.mp3"),
        }
    }

    fn feed(ids: &[&str]) -> Vec<FeedItem> {
        ids.iter().map(|id| item(id)).collect()
    }

    struct FakeFeed {
        items: Vec<FeedItem>,
    }

    #[async_trait]
    impl FeedSource for FakeFeed {
        async fn fetch_items(&self) -> Result<Vec<FeedItem>> {
            Ok(self.items.clone())
        }
    }

    /// Downloader that writes a small real file, or fails for listed URLs
    struct FakeDownloader {
        fail_urls: Vec<String>,
        fetched: Mutex<Vec<String>>,
    }

    impl FakeDownloader {
        fn new() -> Self {
            Self::failing(&[])
        }

        fn failing(urls: &[&str]) -> Self {
            Self {
                fail_urls: urls.iter().map(|u| u.to_string()).collect(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Downloader for FakeDownloader {
        async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
            self.fetched.lock().unwrap().push(url.to_string());
            if self.fail_urls.iter().any(|u| u == url) {
                return Err(DownloadError::Http {
                    url: url.to_string(),
                    status: 404,
                }
                .into());
            }
            tokio::fs::create_dir_all(dest_dir).await?;
            let name = url.rsplit('/').next().unwrap_or("episode.mp3");
            let path = dest_dir.join(name);
            tokio::fs::write(&path, b"fake audio").await?;
            Ok(path)
        }
    }

    /// Transcoder that writes a small real file next to nothing
    struct FakeTranscoder {
        fail: bool,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn render(
            &self,
            audio: &Path,
            _background: &Path,
            dest_dir: &Path,
        ) -> Result<PathBuf> {
            if self.fail {
                return Err(Error::ExternalTool("ffmpeg exited with code 1".to_string()));
            }
            tokio::fs::create_dir_all(dest_dir).await?;
            let stem = audio.file_stem().unwrap().to_string_lossy();
            let path = dest_dir.join(format!("{stem}.mp4"));
            tokio::fs::write(&path, b"fake video").await?;
            Ok(path)
        }
    }

    /// What a planned endpoint answers to its first chunk
    enum SessionPlan {
        Deliver(&'static str),
        Reject(u16),
    }

    struct PlannedEndpoint {
        plan: SessionPlan,
    }

    #[async_trait]
    impl TransferEndpoint for PlannedEndpoint {
        async fn send_chunk(
            &self,
            _offset: u64,
            _data: &[u8],
            _total: u64,
        ) -> std::result::Result<ChunkOutcome, ChunkError> {
            match &self.plan {
                SessionPlan::Deliver(id) => Ok(ChunkOutcome::Final(FinalRecord {
                    id: Some(id.to_string()),
                })),
                SessionPlan::Reject(status) => Err(ChunkError::Status { status: *status }),
            }
        }
    }

    /// Factory handing out planned endpoints in order, recording every open
    struct FakeFactory {
        plans: Mutex<VecDeque<SessionPlan>>,
        opened: Mutex<Vec<(VideoDescriptor, u64)>>,
    }

    impl FakeFactory {
        /// Every session delivers with a default identifier
        fn delivering() -> Self {
            Self::with_plans(vec![])
        }

        fn with_plans(plans: Vec<SessionPlan>) -> Self {
            Self {
                plans: Mutex::new(plans.into_iter().collect()),
                opened: Mutex::new(Vec::new()),
            }
        }

        fn opened(&self) -> Vec<(VideoDescriptor, u64)> {
            self.opened.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EndpointFactory for FakeFactory {
        async fn open(
            &self,
            descriptor: &VideoDescriptor,
            total_bytes: u64,
        ) -> Result<Box<dyn TransferEndpoint>> {
            self.opened
                .lock()
                .unwrap()
                .push((descriptor.clone(), total_bytes));
            let plan = self
                .plans
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(SessionPlan::Deliver("vid-default"));
            Ok(Box::new(PlannedEndpoint { plan }))
        }
    }

    /// Tempdir-backed pipeline harness over the fake collaborators
    struct Rig {
        dir: tempfile::TempDir,
        feed: Arc<FakeFeed>,
        downloader: Arc<FakeDownloader>,
        transcoder: Arc<FakeTranscoder>,
        factory: Arc<FakeFactory>,
    }

    impl Rig {
        fn new(items: Vec<FeedItem>) -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                feed: Arc::new(FakeFeed { items }),
                downloader: Arc::new(FakeDownloader::new()),
                transcoder: Arc::new(FakeTranscoder { fail: false }),
                factory: Arc::new(FakeFactory::delivering()),
            }
        }

        fn config(&self) -> Config {
            Config {
                feed_url: "https://example.com/feed.xml".to_string(),
                audio_dir: self.dir.path().join("audios"),
                video_dir: self.dir.path().join("videos"),
                cursor_path: self.dir.path().join(".last"),
                background_image: self.dir.path().join("background.gif"),
                ..Config::default()
            }
        }

        fn pipeline(&self) -> Pipeline {
            self.pipeline_with(self.config())
        }

        fn pipeline_with(&self, config: Config) -> Pipeline {
            Pipeline::new(
                config,
                self.feed.clone(),
                self.downloader.clone(),
                self.transcoder.clone(),
                self.factory.clone(),
            )
        }

        async fn set_cursor(&self, value: &str) {
            tokio::fs::write(self.dir.path().join(".last"), value)
                .await
                .unwrap();
        }

        async fn cursor(&self) -> Option<String> {
            CursorStore::new(self.dir.path().join(".last")).load().await
        }

        fn audio_path(&self, id: &str) -> PathBuf {
            self.dir.path().join("audios").join(format!("{id}.mp3"))
        }

        fn video_path(&self, id: &str) -> PathBuf {
            self.dir.path().join("videos").join(format!("{id}.mp4"))
        }
    }

    // =========================================================================
    // Ordering and cursor movement
    // =========================================================================

    #[tokio::test]
    async fn delivers_new_items_oldest_first_and_moves_the_cursor() {
        let mut rig = Rig::new(feed(&["3", "2", "1"]));
        rig.factory = Arc::new(FakeFactory::with_plans(vec![
            SessionPlan::Deliver("vid-2"),
            SessionPlan::Deliver("vid-3"),
        ]));
        rig.set_cursor("1").await;

        let report = rig.pipeline().run_once().await.unwrap();

        assert_eq!(report.new_items, 2);
        assert_eq!(
            report.outcomes,
            vec![
                ItemOutcome::Delivered {
                    id: "2".to_string(),
                    remote_id: RemoteId::new("vid-2"),
                },
                ItemOutcome::Delivered {
                    id: "3".to_string(),
                    remote_id: RemoteId::new("vid-3"),
                },
            ],
            "items must be processed oldest-first"
        );
        assert_eq!(
            rig.downloader.fetched(),
            vec![
                "https://example.com/2.mp3".to_string(),
                "https://example.com/3.mp3".to_string(),
            ]
        );
        assert_eq!(rig.cursor().await.as_deref(), Some("3"));
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn empty_feed_neither_advances_nor_processes() {
        let rig = Rig::new(vec![]);

        let report = rig.pipeline().run_once().await.unwrap();

        assert_eq!(report.new_items, 0);
        assert!(report.outcomes.is_empty());
        assert_eq!(rig.cursor().await, None, "no cursor write on an empty feed");
        assert!(rig.downloader.fetched().is_empty());
        assert!(rig.factory.opened().is_empty());
    }

    #[tokio::test]
    async fn unchanged_feed_yields_a_clean_empty_run() {
        let rig = Rig::new(feed(&["3", "2", "1"]));
        rig.set_cursor("3").await;

        let report = rig.pipeline().run_once().await.unwrap();

        assert_eq!(report.new_items, 0);
        assert!(report.is_clean());
        assert!(rig.downloader.fetched().is_empty());
        assert_eq!(rig.cursor().await.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn watch_only_first_run_records_the_cursor_without_processing() {
        let rig = Rig::new(feed(&["3", "2", "1"]));
        let mut config = rig.config();
        config.first_run = FirstRun::WatchOnly;

        let report = rig.pipeline_with(config).run_once().await.unwrap();

        assert!(report.outcomes.is_empty());
        assert_eq!(
            rig.cursor().await.as_deref(),
            Some("3"),
            "watch_only still records the newest identifier"
        );
        assert!(rig.downloader.fetched().is_empty());
    }

    #[tokio::test]
    async fn process_all_first_run_processes_the_whole_feed() {
        let rig = Rig::new(feed(&["3", "2", "1"]));

        let report = rig.pipeline().run_once().await.unwrap();

        assert_eq!(report.new_items, 3);
        assert_eq!(report.delivered(), 3);
        let ids: Vec<&str> = report.outcomes.iter().map(|o| o.item_id()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn cursor_write_failure_aborts_before_any_download() {
        let rig = Rig::new(feed(&["3", "2", "1"]));
        let mut config = rig.config();
        config.cursor_path = rig.dir.path().join("no-such-dir").join(".last");

        let err = rig.pipeline_with(config).run_once().await.unwrap_err();

        assert!(matches!(err, Error::CursorWrite { .. }));
        assert!(
            rig.downloader.fetched().is_empty(),
            "nothing may be delivered on a stale cursor"
        );
        assert!(rig.factory.opened().is_empty());
    }

    // =========================================================================
    // Per-item failure handling
    // =========================================================================

    #[tokio::test]
    async fn download_failure_marks_the_item_failed_at_download() {
        let mut rig = Rig::new(feed(&["1"]));
        rig.downloader = Arc::new(FakeDownloader::failing(&["https://example.com/1.mp3"]));

        let report = rig.pipeline().run_once().await.unwrap();

        match &report.outcomes[0] {
            ItemOutcome::Failed { id, stage, reason } => {
                assert_eq!(id, "1");
                assert_eq!(*stage, Stage::Download);
                assert!(reason.contains("404"), "reason was: {reason}");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(rig.factory.opened().is_empty(), "no session for a failed download");
    }

    #[tokio::test]
    async fn transcode_failure_keeps_the_audio_artifact() {
        let mut rig = Rig::new(feed(&["1"]));
        rig.transcoder = Arc::new(FakeTranscoder { fail: true });

        let report = rig.pipeline().run_once().await.unwrap();

        assert!(matches!(
            report.outcomes[0],
            ItemOutcome::Failed {
                stage: Stage::Transcode,
                ..
            }
        ));
        assert!(
            rig.audio_path("1").exists(),
            "downloaded audio must survive a transcode failure"
        );
        assert!(rig.factory.opened().is_empty());
    }

    #[tokio::test]
    async fn transfer_failure_keeps_both_artifacts() {
        let mut rig = Rig::new(feed(&["1"]));
        rig.factory = Arc::new(FakeFactory::with_plans(vec![SessionPlan::Reject(403)]));

        let report = rig.pipeline().run_once().await.unwrap();

        match &report.outcomes[0] {
            ItemOutcome::Failed { stage, reason, .. } => {
                assert_eq!(*stage, Stage::Transfer);
                assert!(reason.contains("403"), "reason was: {reason}");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(rig.audio_path("1").exists());
        assert!(rig.video_path("1").exists());
    }

    #[tokio::test]
    async fn delivery_removes_the_local_artifacts() {
        let rig = Rig::new(feed(&["1"]));

        let report = rig.pipeline().run_once().await.unwrap();

        assert_eq!(report.delivered(), 1);
        assert!(!rig.audio_path("1").exists(), "audio artifact must be cleaned up");
        assert!(!rig.video_path("1").exists(), "video artifact must be cleaned up");
    }

    // =========================================================================
    // Batch failure policy
    // =========================================================================

    #[tokio::test]
    async fn abort_policy_skips_the_remainder_after_a_failure() {
        let mut rig = Rig::new(feed(&["3", "2", "1"]));
        // The oldest item is processed first and fails
        rig.downloader = Arc::new(FakeDownloader::failing(&["https://example.com/1.mp3"]));

        let report = rig.pipeline().run_once().await.unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 2);
        assert_eq!(
            report.outcomes[1],
            ItemOutcome::Skipped {
                id: "2".to_string()
            }
        );
        assert_eq!(
            report.outcomes[2],
            ItemOutcome::Skipped {
                id: "3".to_string()
            }
        );
        assert_eq!(
            rig.downloader.fetched().len(),
            1,
            "nothing is attempted after the aborting failure"
        );
        assert_eq!(
            rig.cursor().await.as_deref(),
            Some("3"),
            "the cursor stays where fetch time put it"
        );
    }

    #[tokio::test]
    async fn continue_policy_processes_every_item() {
        let mut rig = Rig::new(feed(&["3", "2", "1"]));
        // The middle item fails; its neighbors must still be delivered
        rig.downloader = Arc::new(FakeDownloader::failing(&["https://example.com/2.mp3"]));
        let mut config = rig.config();
        config.on_item_failure = OnItemFailure::Continue;

        let report = rig.pipeline_with(config).run_once().await.unwrap();

        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 0);
        assert_eq!(rig.downloader.fetched().len(), 3);
    }

    // =========================================================================
    // Descriptor assembly
    // =========================================================================

    #[tokio::test]
    async fn descriptor_blends_item_and_config_metadata() {
        let rig = Rig::new(vec![item("1")]);
        let mut config = rig.config();
        config.tags = vec!["podcast".to_string(), "audio".to_string()];
        config.category = "24".to_string();
        config.visibility = Visibility::Unlisted;

        rig.pipeline_with(config).run_once().await.unwrap();

        let opened = rig.factory.opened();
        assert_eq!(opened.len(), 1);
        let (descriptor, total_bytes) = &opened[0];
        assert_eq!(descriptor.title, "Episode 1");
        assert_eq!(descriptor.description, "About 1");
        assert_eq!(descriptor.tags, vec!["podcast", "audio"]);
        assert_eq!(descriptor.category, "24");
        assert_eq!(descriptor.visibility, Visibility::Unlisted);
        assert_eq!(*total_bytes, b"fake video".len() as u64);
    }
}
