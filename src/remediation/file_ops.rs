//! Filesystem-backed [`FileOperations`].

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::library_scan::AUDIO_EXTENSIONS;

use super::gateway::FileOperations;

/// Moves files around inside the library directory.
///
/// Backups live in a sibling directory of the original named
/// `backup_dir_name`, keeping the original file name. An existing backup is
/// never overwritten, so it always holds the file from before the first
/// replacement.
pub struct FsFileOperations {
    backup_dir_name: String,
}

impl FsFileOperations {
    pub fn new(backup_dir_name: impl Into<String>) -> Self {
        Self {
            backup_dir_name: backup_dir_name.into(),
        }
    }

    /// Where the backup of `original` is (or would be) stored.
    pub fn backup_path(&self, original: &Path) -> Result<PathBuf> {
        let parent = original
            .parent()
            .with_context(|| format!("Path has no parent directory: {:?}", original))?;
        let file_name = original
            .file_name()
            .with_context(|| format!("Path has no file name: {:?}", original))?;
        Ok(parent.join(&self.backup_dir_name).join(file_name))
    }
}

#[async_trait]
impl FileOperations for FsFileOperations {
    async fn commit_replacement(
        &self,
        original: &Path,
        candidate: &Path,
        keep_backup: bool,
    ) -> Result<PathBuf> {
        if !tokio::fs::try_exists(candidate).await.unwrap_or(false) {
            bail!("Downloaded file not found: {:?}", candidate);
        }
        if candidate == original {
            debug!("Candidate already at {:?}, nothing to move", original);
            return Ok(original.to_path_buf());
        }

        let target = match candidate.extension() {
            Some(ext) => original.with_extension(ext),
            None => original.to_path_buf(),
        };

        if tokio::fs::try_exists(original).await.unwrap_or(false) {
            if keep_backup {
                let backup = self.backup_path(original)?;
                if let Some(dir) = backup.parent() {
                    tokio::fs::create_dir_all(dir)
                        .await
                        .with_context(|| format!("Failed to create backup dir {:?}", dir))?;
                }
                if tokio::fs::try_exists(&backup).await.unwrap_or(false) {
                    // The existing backup is the untouched original, keep it
                    info!("Keeping earlier backup {:?} for {:?}", backup, original);
                    tokio::fs::remove_file(original)
                        .await
                        .with_context(|| format!("Failed to remove {:?}", original))?;
                } else {
                    tokio::fs::rename(original, &backup)
                        .await
                        .with_context(|| format!("Failed to back up {:?}", original))?;
                    info!("Backed up {:?} to {:?}", original, backup);
                }
            } else {
                tokio::fs::remove_file(original)
                    .await
                    .with_context(|| format!("Failed to remove {:?}", original))?;
            }
        }

        tokio::fs::rename(candidate, &target)
            .await
            .with_context(|| format!("Failed to move {:?} to {:?}", candidate, target))?;
        info!("Committed {:?} as {:?}", candidate, target);
        Ok(target)
    }

    async fn discard_candidate(&self, candidate: &Path) -> Result<()> {
        match tokio::fs::remove_file(candidate).await {
            Ok(()) => {
                debug!("Discarded {:?}", candidate);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to discard {:?}", candidate)),
        }
    }

    async fn revert_to_original(&self, original: &Path) -> Result<()> {
        let backup = self.backup_path(original)?;
        if !tokio::fs::try_exists(&backup).await.unwrap_or(false) {
            bail!("Backup file not found: {:?}", backup);
        }

        if tokio::fs::try_exists(original).await.unwrap_or(false) {
            tokio::fs::remove_file(original)
                .await
                .with_context(|| format!("Failed to remove current file {:?}", original))?;
        }

        // The replacement may carry a different extension than the original
        for ext in AUDIO_EXTENSIONS {
            let sibling = original.with_extension(ext);
            if sibling == original {
                continue;
            }
            if tokio::fs::try_exists(&sibling).await.unwrap_or(false) {
                info!("Removing replacement {:?}", sibling);
                if let Err(e) = tokio::fs::remove_file(&sibling).await {
                    warn!("Failed to remove {:?}: {}", sibling, e);
                }
            }
        }

        tokio::fs::rename(&backup, original)
            .await
            .with_context(|| format!("Failed to restore backup {:?}", backup))?;

        // Only succeeds once the backup dir is empty
        if let Some(dir) = backup.parent() {
            let _ = tokio::fs::remove_dir(dir).await;
        }

        info!("Restored {:?} from backup", original);
        Ok(())
    }
}
