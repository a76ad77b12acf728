//! Audio file inspection using ffprobe.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Tags that help the gateway find the right track.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackMetadata {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub isrc: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
}

/// Everything learned about one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    pub duration_secs: Option<f64>,
    /// Bitrate in kbps.
    pub bitrate_kbps: Option<u32>,
    pub metadata: TrackMetadata,
}

#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeReport>;
}

/// [`MediaProbe`] backed by the ffprobe binary.
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<ProbeReport> {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to execute {:?}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffprobe failed for {:?}: {}", path, stderr.trim());
        }

        parse_ffprobe_output(&output.stdout)
            .with_context(|| format!("Unreadable ffprobe output for {:?}", path))
    }
}

/// ffprobe JSON output structure.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    bit_rate: Option<String>,
}

pub(crate) fn parse_ffprobe_output(stdout: &[u8]) -> Result<ProbeReport> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let duration_secs = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    // Prefer the audio stream bitrate, fall back to the container's
    let stream_bitrate = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .and_then(|s| s.bit_rate.as_deref());
    let bitrate_kbps = stream_bitrate
        .or(probe.format.bit_rate.as_deref())
        .and_then(|b| b.parse::<u64>().ok())
        .map(|b| (b / 1000) as u32);

    let tags: HashMap<String, String> = probe
        .format
        .tags
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();
    let tag = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| tags.get(*k))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    };

    Ok(ProbeReport {
        duration_secs,
        bitrate_kbps,
        metadata: TrackMetadata {
            artist: tag(&["artist", "albumartist", "album_artist"]),
            title: tag(&["title"]),
            album: tag(&["album"]),
            isrc: tag(&["isrc", "tsrc"]),
            duration: duration_secs,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_output() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "bit_rate": "1"},
                {"codec_type": "audio", "bit_rate": "320000"}
            ],
            "format": {
                "duration": "183.451000",
                "bit_rate": "330000",
                "tags": {
                    "ARTIST": "Boards of Canada",
                    "TITLE": "Roygbiv",
                    "album": "Music Has the Right to Children",
                    "TSRC": "GBBPW9800011"
                }
            }
        }"#;

        let report = parse_ffprobe_output(json).unwrap();
        assert_eq!(report.duration_secs, Some(183.451));
        assert_eq!(report.bitrate_kbps, Some(320));
        assert_eq!(report.metadata.artist.as_deref(), Some("Boards of Canada"));
        assert_eq!(report.metadata.title.as_deref(), Some("Roygbiv"));
        assert_eq!(
            report.metadata.album.as_deref(),
            Some("Music Has the Right to Children")
        );
        assert_eq!(report.metadata.isrc.as_deref(), Some("GBBPW9800011"));
        assert_eq!(report.metadata.duration, Some(183.451));
    }

    #[test]
    fn test_parse_fallbacks() {
        let json = br#"{
            "format": {
                "bit_rate": "128000",
                "tags": {"album_artist": "Various", "artist": "  "}
            }
        }"#;

        let report = parse_ffprobe_output(json).unwrap();
        assert_eq!(report.duration_secs, None);
        assert_eq!(report.bitrate_kbps, Some(128));
        assert_eq!(report.metadata.artist.as_deref(), Some("Various"));
        assert!(report.metadata.isrc.is_none());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_ffprobe_output(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let probe = FfprobeProbe::new("/nonexistent/ffprobe-binary");
        let err = probe.probe(Path::new("/tmp/whatever.mp3")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to execute"));
    }
}
