use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use hifi_remedy::remediation::FileOperations;

/// In-memory [`FileOperations`] that records every call.
#[derive(Default)]
pub struct RecordingFileOps {
    commits: Mutex<Vec<(PathBuf, PathBuf, bool)>>,
    discards: Mutex<Vec<PathBuf>>,
    reverts: Mutex<Vec<PathBuf>>,
    fail_commits: AtomicBool,
    fail_discards: AtomicBool,
}

impl RecordingFileOps {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent commit fail.
    pub fn fail_commits(&self) {
        self.fail_commits.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent discard fail.
    pub fn fail_discards(&self) {
        self.fail_discards.store(true, Ordering::SeqCst);
    }

    /// `(original, candidate, keep_backup)` per commit.
    pub fn commits(&self) -> Vec<(PathBuf, PathBuf, bool)> {
        self.commits.lock().unwrap().clone()
    }

    pub fn discards(&self) -> Vec<PathBuf> {
        self.discards.lock().unwrap().clone()
    }

    pub fn reverts(&self) -> Vec<PathBuf> {
        self.reverts.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileOperations for RecordingFileOps {
    async fn commit_replacement(
        &self,
        original: &Path,
        candidate: &Path,
        keep_backup: bool,
    ) -> Result<PathBuf> {
        if self.fail_commits.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        self.commits.lock().unwrap().push((
            original.to_path_buf(),
            candidate.to_path_buf(),
            keep_backup,
        ));
        Ok(match candidate.extension() {
            Some(ext) => original.with_extension(ext),
            None => original.to_path_buf(),
        })
    }

    async fn discard_candidate(&self, candidate: &Path) -> Result<()> {
        if self.fail_discards.load(Ordering::SeqCst) {
            bail!("permission denied");
        }
        self.discards.lock().unwrap().push(candidate.to_path_buf());
        Ok(())
    }

    async fn revert_to_original(&self, original: &Path) -> Result<()> {
        self.reverts.lock().unwrap().push(original.to_path_buf());
        Ok(())
    }
}
