//! Collaborator seams used by the orchestrator.
//!
//! The replacement gateway finds and downloads candidates; file operations
//! commit, discard or revert them on disk. Both are traits so hosts and tests
//! can plug their own implementations.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use super::models::{ReplacementCandidate, SourcePreference};
use super::source_url::SourceUrl;

/// Failure classes reported by a replacement gateway.
///
/// The class is decided where the remote response is parsed, never by
/// inspecting message text downstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The remote service is saturated; the request may succeed later.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),
    /// Any other failure. Not retried automatically.
    #[error("{0}")]
    Failure(String),
}

impl GatewayError {
    pub fn is_capacity(&self) -> bool {
        matches!(self, GatewayError::CapacityExceeded(_))
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::CapacityExceeded(msg) | GatewayError::Failure(msg) => msg,
        }
    }
}

/// Finds and downloads replacement candidates.
#[async_trait]
pub trait ReplacementGateway: Send + Sync {
    /// Search the preferred source for a replacement of `path` and download it.
    ///
    /// Returns `Ok(None)` when no confident candidate exists.
    async fn request_replacement(
        &self,
        path: &Path,
        source: SourcePreference,
    ) -> Result<Option<ReplacementCandidate>, GatewayError>;

    /// Download a replacement for `path` from a user-supplied URL.
    async fn download_from_url(
        &self,
        path: &Path,
        url: &SourceUrl,
    ) -> Result<Option<ReplacementCandidate>, GatewayError>;
}

/// File-level operations applied when resolving a replacement.
#[async_trait]
pub trait FileOperations: Send + Sync {
    /// Put `candidate` in place of `original`, optionally keeping a backup.
    ///
    /// Returns the path the replacement ended up at.
    async fn commit_replacement(
        &self,
        original: &Path,
        candidate: &Path,
        keep_backup: bool,
    ) -> Result<PathBuf>;

    /// Delete a downloaded candidate that will not be used.
    async fn discard_candidate(&self, candidate: &Path) -> Result<()>;

    /// Restore the backed-up original over its replacement.
    async fn revert_to_original(&self, original: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_classes() {
        let capacity = GatewayError::CapacityExceeded("server saturated".to_string());
        let failure = GatewayError::Failure("API Error (404): gone".to_string());

        assert!(capacity.is_capacity());
        assert!(!failure.is_capacity());
        assert_eq!(capacity.message(), "server saturated");
        assert_eq!(capacity.to_string(), "capacity exceeded: server saturated");
        assert_eq!(failure.to_string(), "API Error (404): gone");
    }
}
