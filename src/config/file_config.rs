use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub gateway_url: Option<String>,
    pub client_token: Option<String>,
    pub gateway_timeout_sec: Option<u64>,
    pub ffprobe_path: Option<String>,

    // Feature configs
    pub remediation: Option<RemediationConfig>,
    pub player: Option<PlayerConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RemediationConfig {
    pub max_retries: Option<u32>,
    pub backoff_step_ms: Option<u64>,
    pub tolerance_secs: Option<f64>,
    pub tolerance_ratio: Option<f64>,
    pub keep_backup: Option<bool>,
    pub backup_dir_name: Option<String>,
    /// "auto", "tidal" or "soundcloud"
    pub default_source: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PlayerConfig {
    pub tick_ms: Option<u64>,
    pub in_sync_secs: Option<f64>,
    pub hard_desync_secs: Option<f64>,
    pub rate_nudge: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
