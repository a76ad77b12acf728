//! Remediation orchestrator.
//!
//! Drives each submitted path through: request replacement, classify the
//! result, route to replaced / review / manual fallback, then resolve on user
//! action. Work is strictly sequential: a single worker lock guarantees that at
//! most one path has a gateway request outstanding.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RemediationSettings;

use super::gateway::{FileOperations, GatewayError, ReplacementGateway};
use super::matcher::{classify, DurationTolerance};
use super::models::*;
use super::retry_policy::RetryPolicy;
use super::source_url::SourceUrl;
use super::state::{RemediationEvent, RemediationState};

/// Capacity of the progress broadcast channel.
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("No paths were submitted")]
    EmptyBatch,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Path is already queued or in flight: {0}")]
    AlreadyInFlight(String),
    #[error("Path has a replacement awaiting review: {0}")]
    AwaitingReview(String),
    #[error("Unknown path: {0}")]
    UnknownPath(String),
    #[error("Unknown review entry: {0}")]
    UnknownReviewEntry(Uuid),
    #[error("Unknown comparison: {0}")]
    UnknownComparison(Uuid),
    #[error("Cannot resolve: {0}")]
    NotResolvable(String),
    #[error("File operation failed: {0}")]
    FileOperation(anyhow::Error),
}

/// Owns the remediation state and applies every transition to it.
pub struct RemediationOrchestrator {
    gateway: Arc<dyn ReplacementGateway>,
    file_ops: Arc<dyn FileOperations>,
    retry_policy: RetryPolicy,
    tolerance: DurationTolerance,
    default_options: SubmitOptions,
    state_tx: watch::Sender<Arc<RemediationState>>,
    progress_tx: broadcast::Sender<BatchProgress>,
    /// Held while a path talks to the gateway.
    worker: Mutex<()>,
    /// Held while a review entry or comparison is being resolved.
    resolver: Mutex<()>,
}

impl RemediationOrchestrator {
    pub fn new(
        gateway: Arc<dyn ReplacementGateway>,
        file_ops: Arc<dyn FileOperations>,
        settings: &RemediationSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(Arc::new(RemediationState::new()));
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            gateway,
            file_ops,
            retry_policy: RetryPolicy::new(settings),
            tolerance: settings.tolerance(),
            default_options: settings.default_options(),
            state_tx,
            progress_tx,
            worker: Mutex::new(()),
            resolver: Mutex::new(()),
        }
    }

    /// Options used when the caller has no preference.
    pub fn default_options(&self) -> SubmitOptions {
        self.default_options
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Current state snapshot.
    pub fn snapshot(&self) -> Arc<RemediationState> {
        self.state_tx.borrow().clone()
    }

    /// Receive every new state snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<RemediationState>> {
        self.state_tx.subscribe()
    }

    /// Receive batch progress updates.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<BatchProgress> {
        self.progress_tx.subscribe()
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Process `paths` one at a time until all of them reach a resting status.
    pub async fn submit(
        &self,
        paths: &[String],
        options: SubmitOptions,
    ) -> Result<BatchReport, RemediationError> {
        self.submit_with_cancel(paths, options, CancellationToken::new())
            .await
    }

    /// Like [`submit`](Self::submit), but stops starting new items once
    /// `cancel` fires. The item being processed always runs to completion.
    pub async fn submit_with_cancel(
        &self,
        paths: &[String],
        options: SubmitOptions,
        cancel: CancellationToken,
    ) -> Result<BatchReport, RemediationError> {
        if paths.is_empty() {
            return Err(RemediationError::EmptyBatch);
        }

        let (accepted, rejected) = self.register_batch(paths, options);
        if !rejected.is_empty() {
            warn!(
                "Rejected {} path(s) already queued, in flight or awaiting review",
                rejected.len()
            );
        }
        info!(
            "Submitting batch of {} path(s) (source={}, keep_backup={})",
            accepted.len(),
            options.source.as_str(),
            options.keep_backup
        );

        let mut report = BatchReport {
            rejected,
            ..Default::default()
        };
        let total = accepted.len();

        for (index, path) in accepted.iter().enumerate() {
            if cancel.is_cancelled() {
                self.withdraw(&accepted[index..], &mut report);
                break;
            }

            let _guard = self.worker.lock().await;
            if cancel.is_cancelled() {
                self.withdraw(&accepted[index..], &mut report);
                break;
            }

            let _ = self.progress_tx.send(BatchProgress {
                current: index + 1,
                total,
                path: path.clone(),
            });

            let outcome = self.process_item(path, options).await;
            report.outcomes.push((path.clone(), outcome));
        }

        info!(
            "Batch finished: {} done, {} no match, {} queue full, {} error, {} skipped",
            report.count(WorkStatus::Done),
            report.count(WorkStatus::NoMatch),
            report.count(WorkStatus::QueueFull),
            report.count(WorkStatus::Error),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Retry `path` with a user-supplied URL.
    ///
    /// The URL is validated before anything else; an invalid URL never reaches
    /// the gateway. Capacity errors are not retried here.
    pub async fn submit_manual_url(
        &self,
        path: &str,
        raw_url: &str,
    ) -> Result<ItemOutcome, RemediationError> {
        let url = SourceUrl::parse(raw_url).map_err(|e| {
            warn!("Rejected manual URL for {}: {}", path, e);
            RemediationError::InvalidUrl(e.to_string())
        })?;

        self.register_manual(path, url.source())?;
        info!("Manual download for {} from {}", path, url.source().as_str());

        let _guard = self.worker.lock().await;
        self.emit(RemediationEvent::AttemptStarted {
            path: path.to_string(),
        });

        let keep_backup = self
            .snapshot()
            .item(path)
            .map(|item| item.options.keep_backup)
            .unwrap_or(self.default_options.keep_backup);

        let outcome = match self.gateway.download_from_url(Path::new(path), &url).await {
            Ok(Some(candidate)) => self.classify_candidate(path, candidate, keep_backup).await,
            Ok(None) => self.no_candidate(path),
            // Manual downloads are never retried, capacity included
            Err(e) => self.fail(path, &GatewayError::Failure(e.to_string())),
        };
        Ok(outcome)
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Commit a reviewed candidate over its original.
    pub async fn accept(&self, entry_id: Uuid) -> Result<ComparisonRecord, RemediationError> {
        let _guard = self.resolver.lock().await;
        let state = self.snapshot();
        let entry = state
            .review_entry(entry_id)
            .cloned()
            .ok_or(RemediationError::UnknownReviewEntry(entry_id))?;
        let path = entry.path();
        if state.status(&path).is_some_and(|s| s.blocks_enqueue()) {
            return Err(RemediationError::AlreadyInFlight(path));
        }

        let committed = self
            .file_ops
            .commit_replacement(
                &entry.candidate.original_path,
                &entry.candidate.new_path,
                entry.keep_backup,
            )
            .await
            .map_err(|e| {
                error!("Failed to commit reviewed replacement for {}: {:#}", path, e);
                RemediationError::FileOperation(e)
            })?;

        let record = ComparisonRecord::from_candidate(&entry.candidate, committed, entry.keep_backup);
        info!("Accepted replacement for {} -> {:?}", path, record.replaced_path);
        self.emit(RemediationEvent::ReviewAccepted {
            entry_id,
            record: record.clone(),
        });
        Ok(record)
    }

    /// Drop a reviewed candidate and send its path back to manual fallback.
    pub async fn ignore(&self, entry_id: Uuid) -> Result<(), RemediationError> {
        let _guard = self.resolver.lock().await;
        let state = self.snapshot();
        let entry = state
            .review_entry(entry_id)
            .cloned()
            .ok_or(RemediationError::UnknownReviewEntry(entry_id))?;
        let path = entry.path();
        if state.status(&path).is_some_and(|s| s.blocks_enqueue()) {
            return Err(RemediationError::AlreadyInFlight(path));
        }

        self.file_ops
            .discard_candidate(&entry.candidate.new_path)
            .await
            .map_err(|e| {
                error!(
                    "Failed to discard candidate {:?} for {}: {:#}",
                    entry.candidate.new_path, path, e
                );
                RemediationError::FileOperation(e)
            })?;

        info!("Ignored replacement for {}", path);
        self.emit(RemediationEvent::ReviewIgnored { entry_id, path });
        Ok(())
    }

    /// Restore the backed-up original of a committed replacement.
    pub async fn revert(&self, comparison_id: Uuid) -> Result<(), RemediationError> {
        let _guard = self.resolver.lock().await;
        let state = self.snapshot();
        let record = state
            .comparison(comparison_id)
            .cloned()
            .ok_or(RemediationError::UnknownComparison(comparison_id))?;
        if state
            .status(&record.original_path)
            .is_some_and(|s| s.blocks_enqueue())
        {
            return Err(RemediationError::AlreadyInFlight(record.original_path));
        }
        if !record.backup_kept {
            return Err(RemediationError::NotResolvable(format!(
                "no backup was kept for {}",
                record.original_path
            )));
        }

        self.file_ops
            .revert_to_original(Path::new(&record.original_path))
            .await
            .map_err(|e| {
                error!("Failed to revert {}: {:#}", record.original_path, e);
                RemediationError::FileOperation(e)
            })?;

        info!("Reverted {} to its original", record.original_path);
        self.emit(RemediationEvent::Reverted {
            comparison_id,
            path: record.original_path,
        });
        Ok(())
    }

    /// Close a comparison record without touching any file.
    pub async fn dismiss_comparison(&self, comparison_id: Uuid) -> Result<(), RemediationError> {
        let _guard = self.resolver.lock().await;
        if self.snapshot().comparison(comparison_id).is_none() {
            return Err(RemediationError::UnknownComparison(comparison_id));
        }
        debug!("Dismissed comparison {}", comparison_id);
        self.emit(RemediationEvent::ComparisonDismissed { comparison_id });
        Ok(())
    }

    /// Remove a path that is not queued or in flight from the status map.
    pub fn clear(&self, path: &str) -> Result<(), RemediationError> {
        let mut result = Ok(());
        self.state_tx.send_if_modified(|state| match state.status(path) {
            None => {
                result = Err(RemediationError::UnknownPath(path.to_string()));
                false
            }
            Some(status) if status.blocks_enqueue() => {
                result = Err(RemediationError::AlreadyInFlight(path.to_string()));
                false
            }
            Some(_) => {
                *state = Arc::new(state.apply(&RemediationEvent::Cleared {
                    path: path.to_string(),
                }));
                true
            }
        });
        if result.is_ok() {
            debug!("Cleared {}", path);
        }
        result
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Publish the state that results from `event`.
    fn emit(&self, event: RemediationEvent) {
        self.state_tx.send_modify(|state| {
            *state = Arc::new(state.apply(&event));
        });
    }

    /// Atomically enqueue every path that is not already queued or in flight.
    fn register_batch(
        &self,
        paths: &[String],
        options: SubmitOptions,
    ) -> (Vec<String>, Vec<String>) {
        let mut accepted: Vec<String> = Vec::new();
        let mut rejected = Vec::new();

        self.state_tx.send_if_modified(|state| {
            let mut next = (**state).clone();
            for path in paths {
                let busy = next.status(path).is_some_and(|s| s.blocks_enqueue())
                    || next.has_open_review(path);
                if busy || accepted.contains(path) {
                    rejected.push(path.clone());
                    continue;
                }
                next = next.apply(&RemediationEvent::Enqueued {
                    path: path.clone(),
                    options,
                    origin: WorkOrigin::Batch,
                });
                accepted.push(path.clone());
            }
            if accepted.is_empty() {
                return false;
            }
            *state = Arc::new(next);
            true
        });

        (accepted, rejected)
    }

    fn register_manual(&self, path: &str, source: SourcePreference) -> Result<(), RemediationError> {
        let mut result = Ok(());
        let defaults = self.default_options;
        self.state_tx.send_if_modified(|state| {
            let existing = state.item(path);
            if existing.is_some_and(|item| item.status.blocks_enqueue()) {
                result = Err(RemediationError::AlreadyInFlight(path.to_string()));
                return false;
            }
            // The open entry has to be accepted or ignored first
            if state.has_open_review(path) {
                result = Err(RemediationError::AwaitingReview(path.to_string()));
                return false;
            }
            let keep_backup = existing
                .map(|item| item.options.keep_backup)
                .unwrap_or(defaults.keep_backup);
            *state = Arc::new(state.apply(&RemediationEvent::Enqueued {
                path: path.to_string(),
                options: SubmitOptions {
                    source,
                    keep_backup,
                },
                origin: WorkOrigin::Manual,
            }));
            true
        });
        result
    }

    fn withdraw(&self, remaining: &[String], report: &mut BatchReport) {
        info!(
            "Batch cancelled, withdrawing {} pending path(s)",
            remaining.len()
        );
        for path in remaining {
            self.emit(RemediationEvent::Withdrawn { path: path.clone() });
            report.skipped.push(path.clone());
        }
    }

    /// Run one path through the gateway, retrying capacity errors.
    async fn process_item(&self, path: &str, options: SubmitOptions) -> ItemOutcome {
        self.emit(RemediationEvent::AttemptStarted {
            path: path.to_string(),
        });
        debug!("Requesting replacement for {}", path);

        let mut retries = 0;
        loop {
            let result = self
                .gateway
                .request_replacement(Path::new(path), options.source)
                .await;

            match result {
                Ok(Some(candidate)) => {
                    return self
                        .classify_candidate(path, candidate, options.keep_backup)
                        .await;
                }
                Ok(None) => return self.no_candidate(path),
                Err(e) if self.retry_policy.should_retry(&e, retries) => {
                    retries += 1;
                    let delay = self.retry_policy.delay_for(retries);
                    warn!(
                        "Gateway at capacity for {}, retry {}/{} in {}ms",
                        path,
                        retries,
                        self.retry_policy.max_retries,
                        delay.as_millis()
                    );
                    self.emit(RemediationEvent::RetryScheduled {
                        path: path.to_string(),
                        attempt: retries,
                        message: e.message().to_string(),
                    });
                    tokio::time::sleep(delay).await;
                    self.emit(RemediationEvent::AttemptStarted {
                        path: path.to_string(),
                    });
                }
                Err(e) => return self.fail(path, &e),
            }
        }
    }

    /// Route a candidate to commit or review based on its duration.
    async fn classify_candidate(
        &self,
        path: &str,
        mut candidate: ReplacementCandidate,
        keep_backup: bool,
    ) -> ItemOutcome {
        candidate.original_path = PathBuf::from(path);
        let verdict = classify(
            candidate.original_duration_secs,
            candidate.new_duration_secs,
            &self.tolerance,
        );

        if !verdict.is_match() {
            info!(
                "Duration mismatch for {} ({:.1}s vs {:.1}s), awaiting review",
                path, candidate.original_duration_secs, candidate.new_duration_secs
            );
            let entry = ReviewEntry::new(candidate, keep_backup);
            self.emit(RemediationEvent::ReviewRequested {
                entry: entry.clone(),
            });
            return ItemOutcome::NeedsReview(entry);
        }

        match self
            .file_ops
            .commit_replacement(&candidate.original_path, &candidate.new_path, keep_backup)
            .await
        {
            Ok(committed) => {
                let record = ComparisonRecord::from_candidate(&candidate, committed, keep_backup);
                info!("Replaced {} with {:?}", path, record.replaced_path);
                self.emit(RemediationEvent::Replaced {
                    record: record.clone(),
                });
                ItemOutcome::Replaced(record)
            }
            Err(e) => {
                let message = format!("Failed to commit replacement: {:#}", e);
                error!("{} ({})", message, path);
                self.emit(RemediationEvent::Failed {
                    path: path.to_string(),
                    message: message.clone(),
                });
                ItemOutcome::Failed(message)
            }
        }
    }

    fn no_candidate(&self, path: &str) -> ItemOutcome {
        info!("No replacement found for {}", path);
        self.emit(RemediationEvent::NoCandidate {
            path: path.to_string(),
        });
        ItemOutcome::NoMatch
    }

    fn fail(&self, path: &str, error: &GatewayError) -> ItemOutcome {
        let message = error.message().to_string();
        if error.is_capacity() {
            warn!("Gateway still at capacity for {}, giving up", path);
            self.emit(RemediationEvent::CapacityExhausted {
                path: path.to_string(),
                message: message.clone(),
            });
            ItemOutcome::QueueFull(message)
        } else {
            error!("Gateway failure for {}: {}", path, message);
            self.emit(RemediationEvent::Failed {
                path: path.to_string(),
                message: message.clone(),
            });
            ItemOutcome::Failed(message)
        }
    }
}
