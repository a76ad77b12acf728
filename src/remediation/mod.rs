//! Remediation module
//!
//! Finds higher-quality replacements for audio files through a remote
//! gateway, commits the ones whose duration matches and routes the rest to
//! review or manual fallback.

mod file_ops;
mod gateway;
mod http_gateway;
mod matcher;
mod media_probe;
mod models;
mod orchestrator;
mod retry_policy;
mod source_url;
mod state;

pub use file_ops::FsFileOperations;
pub use gateway::{FileOperations, GatewayError, ReplacementGateway};
pub use http_gateway::HttpReplacementGateway;
pub use matcher::{classify, DurationTolerance, DurationVerdict};
pub use media_probe::{FfprobeProbe, MediaProbe, ProbeReport, TrackMetadata};
pub use models::*;
pub use orchestrator::{RemediationError, RemediationOrchestrator};
pub use retry_policy::RetryPolicy;
pub use source_url::{SourceUrl, SourceUrlError};
pub use state::{RemediationEvent, RemediationState};
