//! Data models for the remediation orchestrator.
//!
//! Defines work items, statuses, gateway results, review entries and
//! comparison records.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a file under remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkStatus {
    Pending,
    Downloading,
    /// Waiting out a capacity backoff; carries the retry attempt (1-based).
    Retrying(u32),
    Done,      // terminal
    NoMatch,   // awaits a manual URL
    QueueFull, // terminal until resubmitted
    Error,     // terminal
}

impl WorkStatus {
    /// Returns true while a gateway request for the path may be outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, WorkStatus::Downloading | WorkStatus::Retrying(_))
    }

    /// Returns true if the path may not be enqueued again right now.
    pub fn blocks_enqueue(&self) -> bool {
        self.is_in_flight() || matches!(self, WorkStatus::Pending)
    }

    /// Returns true for states that only change on explicit user action.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkStatus::Done | WorkStatus::QueueFull | WorkStatus::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "PENDING",
            WorkStatus::Downloading => "DOWNLOADING",
            WorkStatus::Retrying(_) => "RETRYING",
            WorkStatus::Done => "DONE",
            WorkStatus::NoMatch => "NO_MATCH",
            WorkStatus::QueueFull => "QUEUE_FULL",
            WorkStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkStatus::Retrying(attempt) => write!(f, "RETRYING({})", attempt),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Which remote source the gateway should search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourcePreference {
    /// High-fidelity source first, lower-fidelity fallback.
    #[default]
    Auto,
    /// High-fidelity source only.
    #[serde(rename = "tidal")]
    #[value(name = "tidal")]
    PrimaryOnly,
    /// Lower-fidelity source only.
    #[serde(rename = "soundcloud")]
    #[value(name = "soundcloud")]
    SecondaryOnly,
}

impl SourcePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePreference::Auto => "auto",
            SourcePreference::PrimaryOnly => "tidal",
            SourcePreference::SecondaryOnly => "soundcloud",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(SourcePreference::Auto),
            "tidal" | "primary" => Some(SourcePreference::PrimaryOnly),
            "soundcloud" | "secondary" => Some(SourcePreference::SecondaryOnly),
            _ => None,
        }
    }
}

/// Options attached to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmitOptions {
    pub source: SourcePreference,
    /// Keep a copy of the original when it gets replaced.
    pub keep_backup: bool,
}

/// How a work item entered the worklist most recently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrigin {
    Batch,
    Manual,
}

/// One file under remediation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkItem {
    /// Unique key of the item.
    pub path: String,
    pub status: WorkStatus,
    /// Number of automatic attempts made for the current submission.
    pub attempt: u32,
    pub options: SubmitOptions,
    pub origin: WorkOrigin,
    /// Message of the most recent failure, if any.
    pub last_error: Option<String>,
    /// Unix timestamp (seconds) of the last status change.
    pub updated_at: i64,
}

impl WorkItem {
    pub fn new(path: String, options: SubmitOptions, origin: WorkOrigin) -> Self {
        Self {
            path,
            status: WorkStatus::Pending,
            attempt: 0,
            options,
            origin,
            last_error: None,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Copy of this item with a new status and refreshed timestamp.
    pub fn with_status(&self, status: WorkStatus) -> Self {
        Self {
            status,
            updated_at: chrono::Utc::now().timestamp(),
            ..self.clone()
        }
    }
}

/// A replacement file produced by the gateway for one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementCandidate {
    pub original_path: PathBuf,
    /// Where the downloaded candidate currently lives.
    pub new_path: PathBuf,
    pub original_duration_secs: f64,
    pub new_duration_secs: f64,
    pub cover_url: Option<String>,
    /// Bitrate of the candidate in kbps, when known.
    pub new_bitrate: Option<u32>,
}

/// A candidate whose duration disagrees with the original beyond tolerance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewEntry {
    pub id: Uuid,
    pub candidate: ReplacementCandidate,
    pub keep_backup: bool,
    pub created_at: i64,
}

impl ReviewEntry {
    pub fn new(candidate: ReplacementCandidate, keep_backup: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            candidate,
            keep_backup,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn path(&self) -> String {
        self.candidate.original_path.to_string_lossy().to_string()
    }

    /// Absolute duration difference in seconds.
    pub fn duration_diff_secs(&self) -> f64 {
        (self.candidate.original_duration_secs - self.candidate.new_duration_secs).abs()
    }
}

/// A committed replacement kept around for inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRecord {
    pub id: Uuid,
    /// Work item key the record belongs to.
    pub original_path: String,
    /// Path of the replacement after it was committed.
    pub replaced_path: PathBuf,
    pub original_duration_secs: f64,
    pub new_duration_secs: f64,
    pub new_bitrate: Option<u32>,
    pub cover_url: Option<String>,
    pub backup_kept: bool,
    pub created_at: i64,
}

impl ComparisonRecord {
    pub fn from_candidate(
        candidate: &ReplacementCandidate,
        replaced_path: PathBuf,
        backup_kept: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_path: candidate.original_path.to_string_lossy().to_string(),
            replaced_path,
            original_duration_secs: candidate.original_duration_secs,
            new_duration_secs: candidate.new_duration_secs,
            new_bitrate: candidate.new_bitrate,
            cover_url: candidate.cover_url.clone(),
            backup_kept,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Progress of a running batch, broadcast to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress {
    /// 1-based index of the item being processed.
    pub current: usize,
    pub total: usize,
    pub path: String,
}

impl BatchProgress {
    /// Percentage of items started (0-100).
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.current.min(self.total) * 100) / self.total) as u8
    }
}

/// Final classification of one processed path.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Durations agreed; the replacement was committed.
    Replaced(ComparisonRecord),
    /// Durations disagreed; waiting in the review queue.
    NeedsReview(ReviewEntry),
    NoMatch,
    QueueFull(String),
    Failed(String),
}

impl ItemOutcome {
    pub fn status(&self) -> WorkStatus {
        match self {
            ItemOutcome::Replaced(_) | ItemOutcome::NeedsReview(_) => WorkStatus::Done,
            ItemOutcome::NoMatch => WorkStatus::NoMatch,
            ItemOutcome::QueueFull(_) => WorkStatus::QueueFull,
            ItemOutcome::Failed(_) => WorkStatus::Error,
        }
    }
}

/// Result of a `submit` call.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Processed paths in processing order.
    pub outcomes: Vec<(String, ItemOutcome)>,
    /// Paths refused because they were already queued or in flight.
    pub rejected: Vec<String>,
    /// Paths withdrawn before they started because the batch was cancelled.
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn count(&self, status: WorkStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.status() == status)
            .count()
    }

    pub fn outcome_for(&self, path: &str) -> Option<&ItemOutcome> {
        self.outcomes
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, outcome)| outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candidate() -> ReplacementCandidate {
        ReplacementCandidate {
            original_path: PathBuf::from("/music/a.mp3"),
            new_path: PathBuf::from("/music/a.flac"),
            original_duration_secs: 180.0,
            new_duration_secs: 150.0,
            cover_url: Some("https://img/cover.jpg".to_string()),
            new_bitrate: Some(900),
        }
    }

    #[test]
    fn test_work_status_flags() {
        assert!(WorkStatus::Downloading.is_in_flight());
        assert!(WorkStatus::Retrying(2).is_in_flight());
        assert!(!WorkStatus::Pending.is_in_flight());
        assert!(WorkStatus::Pending.blocks_enqueue());
        assert!(!WorkStatus::NoMatch.blocks_enqueue());

        assert!(WorkStatus::Done.is_terminal());
        assert!(WorkStatus::QueueFull.is_terminal());
        assert!(WorkStatus::Error.is_terminal());
        assert!(!WorkStatus::NoMatch.is_terminal());
        assert!(!WorkStatus::Retrying(1).is_terminal());
    }

    #[test]
    fn test_work_status_display() {
        assert_eq!(WorkStatus::Retrying(2).to_string(), "RETRYING(2)");
        assert_eq!(WorkStatus::QueueFull.to_string(), "QUEUE_FULL");
    }

    #[test]
    fn test_work_status_serialization() {
        let json = serde_json::to_string(&WorkStatus::NoMatch).unwrap();
        assert_eq!(json, "\"NO_MATCH\"");

        let json = serde_json::to_string(&WorkStatus::Retrying(1)).unwrap();
        assert_eq!(json, "{\"RETRYING\":1}");
    }

    #[test]
    fn test_source_preference_conversion() {
        assert_eq!(SourcePreference::Auto.as_str(), "auto");
        assert_eq!(SourcePreference::PrimaryOnly.as_str(), "tidal");
        assert_eq!(SourcePreference::SecondaryOnly.as_str(), "soundcloud");

        assert_eq!(
            SourcePreference::from_str("primary"),
            Some(SourcePreference::PrimaryOnly)
        );
        assert_eq!(
            SourcePreference::from_str("soundcloud"),
            Some(SourcePreference::SecondaryOnly)
        );
        assert_eq!(SourcePreference::from_str("bandcamp"), None);
    }

    #[test]
    fn test_work_item_with_status_keeps_identity() {
        let item = WorkItem::new(
            "/music/a.mp3".to_string(),
            SubmitOptions::default(),
            WorkOrigin::Batch,
        );
        let next = item.with_status(WorkStatus::Downloading);

        assert_eq!(item.status, WorkStatus::Pending);
        assert_eq!(next.status, WorkStatus::Downloading);
        assert_eq!(next.path, item.path);
        assert_eq!(next.origin, WorkOrigin::Batch);
    }

    #[test]
    fn test_review_entry_diff() {
        let entry = ReviewEntry::new(make_candidate(), true);
        assert_eq!(entry.path(), "/music/a.mp3");
        assert_eq!(entry.duration_diff_secs(), 30.0);
        assert!(entry.keep_backup);
    }

    #[test]
    fn test_comparison_record_from_candidate() {
        let candidate = make_candidate();
        let record =
            ComparisonRecord::from_candidate(&candidate, PathBuf::from("/music/a.flac"), false);

        assert_eq!(record.original_path, "/music/a.mp3");
        assert_eq!(record.new_bitrate, Some(900));
        assert_eq!(record.cover_url.as_deref(), Some("https://img/cover.jpg"));
        assert!(!record.backup_kept);
    }

    #[test]
    fn test_batch_progress_percentage() {
        let progress = BatchProgress {
            current: 3,
            total: 4,
            path: "x".to_string(),
        };
        assert_eq!(progress.percentage(), 75);

        let empty = BatchProgress {
            current: 0,
            total: 0,
            path: String::new(),
        };
        assert_eq!(empty.percentage(), 0);
    }

    #[test]
    fn test_item_outcome_status() {
        assert_eq!(ItemOutcome::NoMatch.status(), WorkStatus::NoMatch);
        assert_eq!(
            ItemOutcome::QueueFull("busy".to_string()).status(),
            WorkStatus::QueueFull
        );
        assert_eq!(
            ItemOutcome::NeedsReview(ReviewEntry::new(make_candidate(), false)).status(),
            WorkStatus::Done
        );
    }
}
