//! Common test infrastructure
//!
//! Scripted fakes for the orchestrator's collaborators plus helpers to wire
//! them together. Tests should only import from this module.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{make_orchestrator, RecordingFileOps, Scripted, ScriptedGateway, TRACK_A};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_replaces_track() {
//!     let gateway = ScriptedGateway::new();
//!     gateway.push(TRACK_A, Scripted::candidate(200.0, 200.5));
//!     let file_ops = RecordingFileOps::new();
//!     let orchestrator = make_orchestrator(&gateway, &file_ops);
//!
//!     orchestrator.submit(&[TRACK_A.to_string()], Default::default()).await.unwrap();
//! }
//! ```

#![allow(dead_code)]

mod constants;
mod file_ops;
mod gateway;

use std::sync::Arc;

use hifi_remedy::config::RemediationSettings;
use hifi_remedy::remediation::RemediationOrchestrator;

pub use constants::*;
pub use file_ops::RecordingFileOps;
pub use gateway::{CallKind, GatewayCall, Scripted, ScriptedGateway};

/// Orchestrator with default settings over the given fakes.
pub fn make_orchestrator(
    gateway: &Arc<ScriptedGateway>,
    file_ops: &Arc<RecordingFileOps>,
) -> RemediationOrchestrator {
    make_orchestrator_with(gateway, file_ops, &RemediationSettings::default())
}

pub fn make_orchestrator_with(
    gateway: &Arc<ScriptedGateway>,
    file_ops: &Arc<RecordingFileOps>,
    settings: &RemediationSettings,
) -> RemediationOrchestrator {
    RemediationOrchestrator::new(gateway.clone(), file_ops.clone(), settings)
}

/// Batch argument from string literals.
pub fn paths(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
