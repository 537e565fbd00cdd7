//! pod2tube binary: one pipeline pass per invocation
//!
//! Usage: `pod2tube [config.json]`. Designed to run from cron or a systemd
//! timer; exits zero only when every new item was delivered.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pod2tube::auth;
use pod2tube::download::HttpDownloader;
use pod2tube::feed::HttpFeedSource;
use pod2tube::transcode::FfmpegTranscoder;
use pod2tube::transfer::PlatformEndpointFactory;
use pod2tube::{Config, Error, ItemOutcome, Pipeline, Result, RunReport};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pod2tube=info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());

    match run(&config_path).await {
        Ok(report) if report.is_clean() => ExitCode::SUCCESS,
        Ok(report) => {
            error!(
                failed = report.failed(),
                skipped = report.skipped(),
                "Run finished with failures"
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            ExitCode::FAILURE
        }
    }
}

/// Wire the production collaborators and drive one pass
async fn run(config_path: &str) -> Result<RunReport> {
    let config = Config::from_file(config_path).await?;
    info!(config = config_path, feed = %config.feed_url, "Starting pod2tube");

    let token = auth::load_token(&config.token_path).await?;
    let client = auth::authorized_client(&token)?;

    let transcoder = match &config.ffmpeg_path {
        Some(path) => FfmpegTranscoder::new(path.clone()),
        None => FfmpegTranscoder::from_path().ok_or_else(|| {
            Error::ExternalTool(
                "ffmpeg not found in PATH; set ffmpeg_path in the config".to_string(),
            )
        })?,
    };

    let pipeline = Pipeline::new(
        config.clone(),
        Arc::new(HttpFeedSource::new(&config.feed_url)?),
        Arc::new(HttpDownloader::new()?),
        Arc::new(transcoder),
        Arc::new(PlatformEndpointFactory::new(client, &config.api_base)),
    );

    let report = pipeline.run_once().await?;

    for outcome in &report.outcomes {
        match outcome {
            ItemOutcome::Delivered { id, remote_id } => {
                info!(item = %id, remote_id = %remote_id, "Delivered");
            }
            ItemOutcome::Failed { id, stage, reason } => {
                error!(item = %id, stage = ?stage, reason = %reason, "Failed");
            }
            ItemOutcome::Skipped { id } => {
                warn!(item = %id, "Skipped");
            }
        }
    }
    info!(
        new_items = report.new_items,
        delivered = report.delivered(),
        failed = report.failed(),
        skipped = report.skipped(),
        "Run report"
    );

    Ok(report)
}
