//! Remediation state and its pure transition function.
//!
//! The orchestrator never mutates a published snapshot. Each event produces a
//! new [`RemediationState`] via [`RemediationState::apply`], which is then
//! swapped in as a whole.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use super::models::*;

/// Something that happened to the worklist.
#[derive(Debug, Clone, PartialEq)]
pub enum RemediationEvent {
    /// A path entered the worklist (fresh or resubmitted).
    Enqueued {
        path: String,
        options: SubmitOptions,
        origin: WorkOrigin,
    },
    /// A gateway request for the path is about to be issued.
    AttemptStarted { path: String },
    /// A capacity error will be retried after a backoff.
    RetryScheduled {
        path: String,
        attempt: u32,
        message: String,
    },
    /// Durations agreed and the replacement was committed.
    Replaced { record: ComparisonRecord },
    /// Durations disagreed; the candidate waits for a user decision.
    ReviewRequested { entry: ReviewEntry },
    /// The gateway found nothing; the path goes to the manual queue.
    NoCandidate { path: String },
    /// Capacity retries ran out.
    CapacityExhausted { path: String, message: String },
    /// Non-retryable failure.
    Failed { path: String, message: String },
    /// The user accepted a review entry.
    ReviewAccepted {
        entry_id: Uuid,
        record: ComparisonRecord,
    },
    /// The user ignored a review entry.
    ReviewIgnored { entry_id: Uuid, path: String },
    /// The user restored the original of a committed replacement.
    Reverted { comparison_id: Uuid, path: String },
    /// The user closed a comparison record.
    ComparisonDismissed { comparison_id: Uuid },
    /// A pending path was dropped before it started (batch cancelled).
    Withdrawn { path: String },
    /// A terminal path was removed from the status map.
    Cleared { path: String },
}

/// Immutable snapshot of everything the orchestrator tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemediationState {
    items: BTreeMap<String, WorkItem>,
    manual_queue: Vec<String>,
    review_queue: Vec<ReviewEntry>,
    comparisons: Vec<ComparisonRecord>,
}

impl RemediationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the state that results from applying `event`.
    pub fn apply(&self, event: &RemediationEvent) -> RemediationState {
        let mut next = self.clone();
        match event {
            RemediationEvent::Enqueued {
                path,
                options,
                origin,
            } => {
                next.items
                    .insert(path.clone(), WorkItem::new(path.clone(), *options, *origin));
                next.remove_from_manual_queue(path);
            }
            RemediationEvent::AttemptStarted { path } => {
                next.update_item(path, |item| {
                    let status = match item.status {
                        WorkStatus::Retrying(n) => WorkStatus::Retrying(n),
                        _ => WorkStatus::Downloading,
                    };
                    let mut updated = item.with_status(status);
                    updated.attempt += 1;
                    updated
                });
            }
            RemediationEvent::RetryScheduled {
                path,
                attempt,
                message,
            } => {
                next.update_item(path, |item| {
                    let mut updated = item.with_status(WorkStatus::Retrying(*attempt));
                    updated.last_error = Some(message.clone());
                    updated
                });
            }
            RemediationEvent::Replaced { record } => {
                next.finish_done(&record.original_path);
                next.comparisons.push(record.clone());
            }
            RemediationEvent::ReviewRequested { entry } => {
                next.finish_done(&entry.path());
                next.review_queue.push(entry.clone());
            }
            RemediationEvent::NoCandidate { path } => {
                next.mark_no_match(path, None);
            }
            RemediationEvent::CapacityExhausted { path, message } => {
                next.finish_with_error(path, WorkStatus::QueueFull, message);
            }
            RemediationEvent::Failed { path, message } => {
                next.finish_with_error(path, WorkStatus::Error, message);
            }
            RemediationEvent::ReviewAccepted { entry_id, record } => {
                next.review_queue.retain(|e| e.id != *entry_id);
                next.finish_done(&record.original_path);
                next.comparisons.push(record.clone());
            }
            RemediationEvent::ReviewIgnored { entry_id, path } => {
                let keep_backup = next
                    .review_queue
                    .iter()
                    .find(|e| e.id == *entry_id)
                    .map(|e| e.keep_backup);
                next.review_queue.retain(|e| e.id != *entry_id);
                next.mark_no_match(path, keep_backup);
            }
            RemediationEvent::Reverted {
                comparison_id,
                path,
            } => {
                next.comparisons.retain(|c| c.id != *comparison_id);
                next.mark_no_match(path, None);
            }
            RemediationEvent::ComparisonDismissed { comparison_id } => {
                next.comparisons.retain(|c| c.id != *comparison_id);
            }
            RemediationEvent::Withdrawn { path } | RemediationEvent::Cleared { path } => {
                next.items.remove(path);
                next.remove_from_manual_queue(path);
            }
        }
        next
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn item(&self, path: &str) -> Option<&WorkItem> {
        self.items.get(path)
    }

    pub fn status(&self, path: &str) -> Option<WorkStatus> {
        self.items.get(path).map(|item| item.status)
    }

    /// All work items, ordered by path.
    pub fn items(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.values()
    }

    /// Paths waiting for a user-supplied URL, oldest first.
    pub fn manual_queue(&self) -> &[String] {
        &self.manual_queue
    }

    pub fn review_queue(&self) -> &[ReviewEntry] {
        &self.review_queue
    }

    pub fn comparisons(&self) -> &[ComparisonRecord] {
        &self.comparisons
    }

    pub fn review_entry(&self, id: Uuid) -> Option<&ReviewEntry> {
        self.review_queue.iter().find(|e| e.id == id)
    }

    /// Whether a downloaded candidate for `path` is still waiting on a decision.
    pub fn has_open_review(&self, path: &str) -> bool {
        self.review_queue.iter().any(|e| e.path() == path)
    }

    pub fn comparison(&self, id: Uuid) -> Option<&ComparisonRecord> {
        self.comparisons.iter().find(|c| c.id == id)
    }

    /// Number of items currently Downloading or Retrying.
    pub fn in_flight_count(&self) -> usize {
        self.items
            .values()
            .filter(|item| item.status.is_in_flight())
            .count()
    }

    pub fn count_with_status(&self, status: WorkStatus) -> usize {
        self.items
            .values()
            .filter(|item| item.status == status)
            .count()
    }

    // =========================================================================
    // Transition helpers
    // =========================================================================

    fn update_item(&mut self, path: &str, f: impl FnOnce(&WorkItem) -> WorkItem) {
        if let Some(item) = self.items.get(path) {
            let updated = f(item);
            self.items.insert(path.to_string(), updated);
        }
    }

    fn finish_done(&mut self, path: &str) {
        self.update_item(path, |item| {
            let mut updated = item.with_status(WorkStatus::Done);
            updated.last_error = None;
            updated
        });
        self.remove_from_manual_queue(path);
    }

    fn finish_with_error(&mut self, path: &str, status: WorkStatus, message: &str) {
        self.update_item(path, |item| {
            let mut updated = item.with_status(status);
            updated.last_error = Some(message.to_string());
            updated
        });
    }

    /// Move `path` to NoMatch, creating the item if it was cleared meanwhile.
    fn mark_no_match(&mut self, path: &str, keep_backup: Option<bool>) {
        let item = match self.items.get(path) {
            Some(item) => item.with_status(WorkStatus::NoMatch),
            None => {
                let options = SubmitOptions {
                    keep_backup: keep_backup.unwrap_or(false),
                    ..Default::default()
                };
                WorkItem::new(path.to_string(), options, WorkOrigin::Manual)
                    .with_status(WorkStatus::NoMatch)
            }
        };
        self.items.insert(path.to_string(), item);
        if !self.manual_queue.iter().any(|p| p == path) {
            self.manual_queue.push(path.to_string());
        }
    }

    fn remove_from_manual_queue(&mut self, path: &str) {
        self.manual_queue.retain(|p| p != path);
    }
}
