//! Expansion of user-supplied paths into the audio files to remediate.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Extensions treated as audio, lowercase.
pub const AUDIO_EXTENSIONS: [&str; 8] = ["mp3", "m4a", "aac", "wav", "flac", "ogg", "opus", "webm"];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Returns true if `path` has a recognised audio extension.
pub fn is_audio_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Collect audio files from `inputs`.
///
/// Files are kept if they look like audio; directories are walked recursively,
/// skipping any directory named `backup_dir_name`. The result is sorted and
/// free of duplicates.
pub fn collect_audio_paths(
    inputs: &[PathBuf],
    backup_dir_name: &str,
) -> Result<Vec<PathBuf>, ScanError> {
    let mut found = BTreeSet::new();

    for input in inputs {
        if !input.exists() {
            return Err(ScanError::PathNotFound(input.clone()));
        }

        if input.is_file() {
            if is_audio_path(input) {
                found.insert(input.clone());
            } else {
                warn!("Skipping non-audio file {:?}", input);
            }
            continue;
        }

        let walker = WalkDir::new(input)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_backup_dir(e, backup_dir_name));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_audio_path(entry.path()) {
                        found.insert(entry.into_path());
                    }
                }
                Err(e) => {
                    warn!("Error accessing entry: {}", e);
                }
            }
        }
    }

    debug!("Collected {} audio file(s)", found.len());
    Ok(found.into_iter().collect())
}

fn is_backup_dir(entry: &DirEntry, backup_dir_name: &str) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == backup_dir_name
}
