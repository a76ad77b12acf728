//! Hi-Fi Remedy library
//!
//! The binary is a thin terminal front end over these modules; they are
//! exposed here so integration tests and other hosts can drive them directly.

pub mod config;
pub mod library_scan;
pub mod remediation;
pub mod sync_player;
