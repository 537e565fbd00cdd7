//! Core types for pod2tube

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier assigned by the remote platform to a delivered video
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub String);

impl RemoteId {
    /// Create a new RemoteId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RemoteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RemoteId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single entry from the syndication feed
///
/// Items are immutable once fetched. The feed yields them newest first, and
/// identifiers are opaque and stable across fetches; the cursor logic relies
/// on both properties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Opaque identifier, stable across fetches (entry guid, falling back to
    /// the link, then the title)
    pub id: String,

    /// Episode title
    pub title: String,

    /// Episode description (may be empty)
    pub description: String,

    /// URL of the raw audio media (the `audio/mpeg` enclosure)
    pub audio_url: String,
}

/// Visibility level applied to delivered videos
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Publicly listed
    Public,
    /// Visible only to the owning account
    #[default]
    Private,
    /// Reachable by link, not listed
    Unlisted,
}

impl Visibility {
    /// Wire name used in the platform's status object
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target-platform metadata for one video
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    /// Video title (from the feed item)
    pub title: String,

    /// Video description (from the feed item)
    pub description: String,

    /// Keyword list attached to the video
    pub tags: Vec<String>,

    /// Platform category code (e.g., "22")
    pub category: String,

    /// Visibility level
    pub visibility: Visibility,
}

/// A feed item bound to its transcoded local artifact, ready for upload
///
/// Created after download and transcode succeed; discarded once the upload
/// session terminates. The artifact files are deleted only on delivery.
#[derive(Clone, Debug)]
pub struct TransferItem {
    /// The originating feed item
    pub item: FeedItem,

    /// Local path of the downloaded audio artifact
    pub audio_path: PathBuf,

    /// Local path of the transcoded video artifact
    pub video_path: PathBuf,

    /// Platform metadata describing the video
    pub descriptor: VideoDescriptor,
}

/// Pipeline stage at which an item failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Audio download stage
    Download,
    /// Audio-to-video transcode stage
    Transcode,
    /// Upload session stage
    Transfer,
}

/// Terminal outcome for one feed item within a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Upload session completed; the platform assigned `remote_id`
    Delivered {
        /// Feed item identifier
        id: String,
        /// Identifier the platform assigned to the video
        remote_id: RemoteId,
    },

    /// Item abandoned at `stage`; its artifacts are kept on disk where they
    /// already exist
    Failed {
        /// Feed item identifier
        id: String,
        /// The stage where processing stopped
        stage: Stage,
        /// Display form of the error that stopped it
        reason: String,
    },

    /// Item never attempted (an earlier failure aborted the run)
    Skipped {
        /// Feed item identifier
        id: String,
    },
}

impl ItemOutcome {
    /// The feed item identifier this outcome refers to
    pub fn item_id(&self) -> &str {
        match self {
            ItemOutcome::Delivered { id, .. }
            | ItemOutcome::Failed { id, .. }
            | ItemOutcome::Skipped { id } => id,
        }
    }
}

/// Summary of one pipeline pass
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of items the cursor marked as new this run
    pub new_items: usize,

    /// Per-item outcomes in processing (oldest-first) order
    pub outcomes: Vec<ItemOutcome>,
}

impl RunReport {
    /// Count of items delivered to the platform
    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Delivered { .. }))
            .count()
    }

    /// Count of items that failed at some stage
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Failed { .. }))
            .count()
    }

    /// Count of items never attempted because the run aborted early
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Skipped { .. }))
            .count()
    }

    /// Whether every new item was delivered
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    // --- RemoteId conversions ---

    #[test]
    fn remote_id_display_matches_inner_value() {
        let id = RemoteId::new("dQw4w9WgXcQ");
        assert_eq!(id.to_string(), "dQw4w9WgXcQ");
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn remote_id_from_str_and_string_agree() {
        let from_str: RemoteId = "abc123".into();
        let from_string: RemoteId = String::from("abc123").into();
        assert_eq!(from_str, from_string);
    }

    #[test]
    fn remote_id_serializes_transparently() {
        let id = RemoteId::new("xyz");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"xyz\"", "newtype must serialize as a bare string");
        let back: RemoteId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    // --- Visibility wire encoding ---

    #[test]
    fn visibility_serializes_lowercase_for_all_variants() {
        let cases = [
            (Visibility::Public, "\"public\""),
            (Visibility::Private, "\"private\""),
            (Visibility::Unlisted, "\"unlisted\""),
        ];

        for (variant, expected_json) in cases {
            let json = serde_json::to_string(&variant).unwrap();
            assert_eq!(json, expected_json, "{variant:?} should encode lowercase");
            let back: Visibility = serde_json::from_str(&json).unwrap();
            assert_eq!(back, variant);
        }
    }

    #[test]
    fn visibility_as_str_matches_serde_encoding() {
        for variant in [Visibility::Public, Visibility::Private, Visibility::Unlisted] {
            let json = serde_json::to_string(&variant).unwrap();
            assert_eq!(json, format!("\"{}\"", variant.as_str()));
        }
    }

    #[test]
    fn visibility_rejects_unknown_value() {
        let result: Result<Visibility, _> = serde_json::from_str("\"friends-only\"");
        assert!(
            result.is_err(),
            "unknown visibility values must fail deserialization, not default"
        );
    }

    #[test]
    fn visibility_default_is_private() {
        assert_eq!(Visibility::default(), Visibility::Private);
    }

    // --- ItemOutcome tagged encoding ---

    #[test]
    fn item_outcome_serializes_with_outcome_tag() {
        let outcome = ItemOutcome::Delivered {
            id: "ep-42".into(),
            remote_id: RemoteId::new("vid-1"),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "delivered");
        assert_eq!(json["id"], "ep-42");
        assert_eq!(json["remote_id"], "vid-1");
    }

    #[test]
    fn item_outcome_failed_carries_stage_and_reason() {
        let outcome = ItemOutcome::Failed {
            id: "ep-7".into(),
            stage: Stage::Transfer,
            reason: "upload rejected by remote endpoint with HTTP 403".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["stage"], "transfer");
        assert!(json["reason"].as_str().unwrap().contains("403"));
    }

    #[test]
    fn item_outcome_item_id_covers_all_variants() {
        let outcomes = [
            ItemOutcome::Delivered {
                id: "a".into(),
                remote_id: RemoteId::new("r"),
            },
            ItemOutcome::Failed {
                id: "b".into(),
                stage: Stage::Download,
                reason: "HTTP 404".into(),
            },
            ItemOutcome::Skipped { id: "c".into() },
        ];
        let ids: Vec<&str> = outcomes.iter().map(|o| o.item_id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    // --- RunReport counters ---

    #[test]
    fn run_report_counters_partition_outcomes() {
        let report = RunReport {
            new_items: 4,
            outcomes: vec![
                ItemOutcome::Delivered {
                    id: "1".into(),
                    remote_id: RemoteId::new("r1"),
                },
                ItemOutcome::Delivered {
                    id: "2".into(),
                    remote_id: RemoteId::new("r2"),
                },
                ItemOutcome::Failed {
                    id: "3".into(),
                    stage: Stage::Transfer,
                    reason: "retries exhausted".into(),
                },
                ItemOutcome::Skipped { id: "4".into() },
            ],
        };

        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn empty_run_report_is_clean() {
        let report = RunReport::default();
        assert_eq!(report.delivered(), 0);
        assert!(report.is_clean(), "a run with no new items is a clean run");
    }

    #[test]
    fn all_delivered_report_is_clean() {
        let report = RunReport {
            new_items: 1,
            outcomes: vec![ItemOutcome::Delivered {
                id: "1".into(),
                remote_id: RemoteId::new("r1"),
            }],
        };
        assert!(report.is_clean());
    }
}
