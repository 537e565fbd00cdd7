//! Incremental cursor over the feed
//!
//! The cursor is the pipeline's only durable state: a single opaque identifier
//! stored in a flat file, marking the newest feed item any previous run has
//! seen. [`compute_new`] is a pure function over a feed snapshot and a cursor
//! value; [`CursorStore`] is the injected read/write capability that persists
//! the value between runs.

use crate::config::FirstRun;
use crate::error::{Error, Result};
use crate::types::FeedItem;
use std::path::PathBuf;

/// File-backed persistence for the cursor identifier
///
/// Owns the cursor file exclusively; nothing else reads or writes it.
#[derive(Clone, Debug)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this store persists to
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read the persisted cursor, if any
    ///
    /// A missing, empty, or unreadable file is treated as "no cursor" rather
    /// than an error: the worst consequence is re-processing from the top of
    /// the feed, which beats failing every subsequent run.
    pub async fn load(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    None
                } else {
                    Some(token.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Cursor file unreadable, treating as absent"
                );
                None
            }
        }
    }

    /// Persist `newest_id` as the new cursor, overwriting any previous value
    ///
    /// Called once per run, at fetch time, before any delivery is attempted.
    /// That ordering trades "deliver at least once" for "deliver at most
    /// once": an interrupted run never re-uploads on the next pass, but items
    /// it never reached stay behind the cursor. Idempotent; safe to call with
    /// the same value repeatedly.
    ///
    /// A write failure here is fatal for the run. Proceeding to deliver with
    /// a stale cursor would re-deliver the entire batch next time.
    pub async fn advance(&self, newest_id: &str) -> Result<()> {
        tokio::fs::write(&self.path, newest_id)
            .await
            .map_err(|e| Error::CursorWrite {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(
            path = %self.path.display(),
            cursor = newest_id,
            "Cursor advanced"
        );
        Ok(())
    }
}

/// Compute the prefix of a newest-first feed snapshot that is new relative to
/// `cursor`
///
/// Scans from newest to oldest and stops at the first item whose identifier
/// matches the cursor; everything before the match is new. Items past the
/// match are never examined, so duplicate identifiers deeper in the feed are
/// irrelevant. A cursor that matches nothing (the feed drifted past it) makes
/// the whole snapshot new. With no cursor, `first_run` decides: the whole
/// snapshot, or nothing at all.
///
/// Pure function of its inputs; the returned slice borrows from `items`.
pub fn compute_new<'a>(
    items: &'a [FeedItem],
    cursor: Option<&str>,
    first_run: FirstRun,
) -> &'a [FeedItem] {
    match cursor {
        None => match first_run {
            FirstRun::ProcessAll => items,
            FirstRun::WatchOnly => &items[..0],
        },
        Some(cursor_id) => {
            let boundary = items
                .iter()
                .position(|item| item.id == cursor_id)
                .unwrap_or(items.len());
            &items[..boundary]
        }
    }
}
