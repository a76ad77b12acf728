mod file_config;

pub use file_config::{FileConfig, PlayerConfig, RemediationConfig};

use crate::remediation::{DurationTolerance, SourcePreference, SubmitOptions};
use crate::sync_player::DriftPolicy;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted for the client token.
pub const CLIENT_TOKEN_ENV: &str = "HIFI_REMEDY_TOKEN";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub gateway_url: Option<String>,
    pub client_token: Option<String>,
    pub gateway_timeout_sec: u64,
    pub ffprobe_path: Option<PathBuf>,
    pub source: Option<SourcePreference>,
    pub keep_backup: Option<bool>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            client_token: None,
            gateway_timeout_sec: 300,
            ffprobe_path: None,
            source: None,
            keep_backup: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub gateway_url: String,
    pub client_token: Option<String>,
    pub gateway_timeout_sec: u64,
    pub ffprobe_path: PathBuf,

    // Feature configs (with defaults)
    pub remediation: RemediationSettings,
    pub player: PlayerSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let gateway_url = file
            .gateway_url
            .or_else(|| cli.gateway_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("gateway_url must be specified via --gateway-url or in config file")
            })?;
        let gateway_url = gateway_url.trim().trim_end_matches('/').to_string();
        if !(gateway_url.starts_with("http://") || gateway_url.starts_with("https://")) {
            bail!("gateway_url must be an http(s) URL: {}", gateway_url);
        }

        let client_token = file
            .client_token
            .or_else(|| cli.client_token.clone())
            .filter(|t| !t.trim().is_empty());

        let gateway_timeout_sec = file.gateway_timeout_sec.unwrap_or(cli.gateway_timeout_sec);
        if gateway_timeout_sec == 0 {
            bail!("gateway_timeout_sec must be greater than zero");
        }

        let ffprobe_path = file
            .ffprobe_path
            .map(PathBuf::from)
            .or_else(|| cli.ffprobe_path.clone())
            .unwrap_or_else(|| PathBuf::from("ffprobe"));

        // Remediation settings - merge file config with CLI and defaults
        let rem_file = file.remediation.unwrap_or_default();
        let rem_defaults = RemediationSettings::default();
        let default_source = match rem_file.default_source {
            Some(s) => SourcePreference::from_str(&s)
                .ok_or_else(|| anyhow::anyhow!("Unknown default_source: {}", s))?,
            None => cli.source.unwrap_or(rem_defaults.default_source),
        };
        let remediation = RemediationSettings {
            max_retries: rem_file.max_retries.unwrap_or(rem_defaults.max_retries),
            backoff_step_ms: rem_file
                .backoff_step_ms
                .unwrap_or(rem_defaults.backoff_step_ms),
            tolerance_secs: rem_file
                .tolerance_secs
                .unwrap_or(rem_defaults.tolerance_secs),
            tolerance_ratio: rem_file
                .tolerance_ratio
                .unwrap_or(rem_defaults.tolerance_ratio),
            keep_backup: rem_file
                .keep_backup
                .or(cli.keep_backup)
                .unwrap_or(rem_defaults.keep_backup),
            backup_dir_name: rem_file
                .backup_dir_name
                .unwrap_or(rem_defaults.backup_dir_name),
            default_source,
        };
        remediation.validate()?;

        let player_file = file.player.unwrap_or_default();
        let player_defaults = PlayerSettings::default();
        let player = PlayerSettings {
            tick_ms: player_file.tick_ms.unwrap_or(player_defaults.tick_ms),
            in_sync_secs: player_file
                .in_sync_secs
                .unwrap_or(player_defaults.in_sync_secs),
            hard_desync_secs: player_file
                .hard_desync_secs
                .unwrap_or(player_defaults.hard_desync_secs),
            rate_nudge: player_file.rate_nudge.unwrap_or(player_defaults.rate_nudge),
        };
        player.validate()?;

        Ok(Self {
            gateway_url,
            client_token,
            gateway_timeout_sec,
            ffprobe_path,
            remediation,
            player,
        })
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_sec)
    }
}

#[derive(Debug, Clone)]
pub struct RemediationSettings {
    pub max_retries: u32,
    pub backoff_step_ms: u64,
    pub tolerance_secs: f64,
    pub tolerance_ratio: f64,
    pub keep_backup: bool,
    pub backup_dir_name: String,
    pub default_source: SourcePreference,
}

impl Default for RemediationSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_step_ms: 2000,
            tolerance_secs: 2.0,
            tolerance_ratio: 0.05,
            keep_backup: false,
            backup_dir_name: "backup-originals".to_string(),
            default_source: SourcePreference::Auto,
        }
    }
}

impl RemediationSettings {
    fn validate(&self) -> Result<()> {
        if self.tolerance_secs < 0.0 {
            bail!("tolerance_secs must not be negative");
        }
        if !(0.0..=1.0).contains(&self.tolerance_ratio) {
            bail!("tolerance_ratio must be between 0 and 1");
        }
        let name = self.backup_dir_name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            bail!("backup_dir_name must be a plain directory name");
        }
        Ok(())
    }

    pub fn tolerance(&self) -> DurationTolerance {
        DurationTolerance {
            max_diff_secs: self.tolerance_secs,
            max_relative: self.tolerance_ratio,
        }
    }

    pub fn default_options(&self) -> SubmitOptions {
        SubmitOptions {
            source: self.default_source,
            keep_backup: self.keep_backup,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub tick_ms: u64,
    pub in_sync_secs: f64,
    pub hard_desync_secs: f64,
    pub rate_nudge: f64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            in_sync_secs: 0.02,
            // Not 0.5: a 0.6 s gap should be nudged, not snapped
            hard_desync_secs: 0.75,
            rate_nudge: 0.05,
        }
    }
}

impl PlayerSettings {
    fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            bail!("player tick_ms must be greater than zero");
        }
        if self.in_sync_secs < 0.0 || self.in_sync_secs >= self.hard_desync_secs {
            bail!("player in_sync_secs must be non-negative and below hard_desync_secs");
        }
        if self.rate_nudge <= 0.0 || self.rate_nudge >= 1.0 {
            bail!("player rate_nudge must be between 0 and 1 (exclusive)");
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn drift_policy(&self) -> DriftPolicy {
        DriftPolicy {
            in_sync_secs: self.in_sync_secs,
            hard_desync_secs: self.hard_desync_secs,
            rate_nudge: self.rate_nudge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli_with_url() -> CliConfig {
        CliConfig {
            gateway_url: Some("http://localhost:8000/".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_cli_only() {
        let cli = CliConfig {
            gateway_url: Some("https://remedy.example:8443".to_string()),
            client_token: Some("secret".to_string()),
            gateway_timeout_sec: 60,
            ffprobe_path: Some(PathBuf::from("/opt/ffmpeg/ffprobe")),
            source: Some(SourcePreference::PrimaryOnly),
            keep_backup: Some(true),
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.gateway_url, "https://remedy.example:8443");
        assert_eq!(config.client_token.as_deref(), Some("secret"));
        assert_eq!(config.gateway_timeout(), Duration::from_secs(60));
        assert_eq!(config.ffprobe_path, PathBuf::from("/opt/ffmpeg/ffprobe"));
        assert_eq!(
            config.remediation.default_source,
            SourcePreference::PrimaryOnly
        );
        assert!(config.remediation.keep_backup);
        assert_eq!(config.remediation.max_retries, 2);
        assert_eq!(config.player.tick_ms, 100);
    }

    #[test]
    fn test_resolve_strips_trailing_slash() {
        let config = AppConfig::resolve(&cli_with_url(), None).unwrap();
        assert_eq!(config.gateway_url, "http://localhost:8000");
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert!(config.client_token.is_none());
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let cli = CliConfig {
            gateway_url: Some("http://cli:8000".to_string()),
            gateway_timeout_sec: 120,
            source: Some(SourcePreference::SecondaryOnly),
            keep_backup: Some(false),
            ..Default::default()
        };

        let file_config = FileConfig {
            gateway_url: Some("http://toml:9000".to_string()),
            remediation: Some(RemediationConfig {
                max_retries: Some(4),
                default_source: Some("tidal".to_string()),
                keep_backup: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.gateway_url, "http://toml:9000");
        assert_eq!(config.remediation.max_retries, 4);
        assert_eq!(
            config.remediation.default_source,
            SourcePreference::PrimaryOnly
        );
        assert!(config.remediation.keep_backup);
        // CLI value used when TOML doesn't specify
        assert_eq!(config.gateway_timeout_sec, 120);
        // Defaults fill the rest
        assert_eq!(config.remediation.backoff_step_ms, 2000);
        assert_eq!(config.remediation.backup_dir_name, "backup-originals");
    }

    #[test]
    fn test_resolve_missing_gateway_url_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("gateway_url must be specified"));
    }

    #[test]
    fn test_resolve_rejects_non_http_url() {
        let cli = CliConfig {
            gateway_url: Some("ftp://nope".to_string()),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli, None).is_err());
    }

    #[test]
    fn test_resolve_rejects_unknown_source() {
        let file_config = FileConfig {
            remediation: Some(RemediationConfig {
                default_source: Some("bandcamp".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli_with_url(), Some(file_config));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown default_source"));
    }

    #[test]
    fn test_resolve_validates_tolerances() {
        let file_config = FileConfig {
            remediation: Some(RemediationConfig {
                tolerance_ratio: Some(1.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli_with_url(), Some(file_config)).is_err());

        let file_config = FileConfig {
            remediation: Some(RemediationConfig {
                backup_dir_name: Some("a/b".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli_with_url(), Some(file_config)).is_err());
    }

    #[test]
    fn test_resolve_validates_player() {
        let file_config = FileConfig {
            player: Some(PlayerConfig {
                in_sync_secs: Some(1.0),
                hard_desync_secs: Some(0.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli_with_url(), Some(file_config)).is_err());

        let file_config = FileConfig {
            player: Some(PlayerConfig {
                tick_ms: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli_with_url(), Some(file_config)).is_err());
    }

    #[test]
    fn test_settings_conversions() {
        let config = AppConfig::resolve(&cli_with_url(), None).unwrap();

        let tolerance = config.remediation.tolerance();
        assert_eq!(tolerance, DurationTolerance::default());

        let options = config.remediation.default_options();
        assert_eq!(options.source, SourcePreference::Auto);
        assert!(!options.keep_backup);

        let policy = config.player.drift_policy();
        assert_eq!(policy.rate_nudge, 0.05);
        assert_eq!(config.player.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_load_file_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
gateway_url = "http://from-file:8000"
gateway_timeout_sec = 30

[remediation]
backoff_step_ms = 250
keep_backup = true

[player]
hard_desync_secs = 0.5
"#
        )
        .unwrap();

        let file_config = FileConfig::load(file.path()).unwrap();
        let config = AppConfig::resolve(&CliConfig::default(), Some(file_config)).unwrap();

        assert_eq!(config.gateway_url, "http://from-file:8000");
        assert_eq!(config.gateway_timeout_sec, 30);
        assert_eq!(config.remediation.backoff_step_ms, 250);
        assert!(config.remediation.keep_backup);
        assert_eq!(config.player.hard_desync_secs, 0.5);
    }

    #[test]
    fn test_load_invalid_file_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gateway_url = [not valid").unwrap();
        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
