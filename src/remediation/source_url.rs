//! Validation of user-supplied source URLs.

use std::fmt;

use thiserror::Error;

use super::models::SourcePreference;

/// Domain marker of the high-fidelity source.
pub const PRIMARY_MARKER: &str = "tidal.com";
/// Domain marker of the lower-fidelity source.
pub const SECONDARY_MARKER: &str = "soundcloud.com";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceUrlError {
    #[error("URL is empty")]
    Empty,
    #[error("URL must start with http:// or https://: {0}")]
    BadScheme(String),
    #[error("URL does not point to a recognized source (tidal.com or soundcloud.com): {0}")]
    UnknownSource(String),
}

/// A manual download URL that names a recognized source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl {
    url: String,
    source: SourcePreference,
}

impl SourceUrl {
    /// Validate `raw` and detect which source it belongs to.
    pub fn parse(raw: &str) -> Result<Self, SourceUrlError> {
        let url = raw.trim();
        if url.is_empty() {
            return Err(SourceUrlError::Empty);
        }

        let lower = url.to_ascii_lowercase();
        if !(lower.starts_with("https://") || lower.starts_with("http://")) {
            return Err(SourceUrlError::BadScheme(url.to_string()));
        }

        let source = if lower.contains(PRIMARY_MARKER) {
            SourcePreference::PrimaryOnly
        } else if lower.contains(SECONDARY_MARKER) {
            SourcePreference::SecondaryOnly
        } else {
            return Err(SourceUrlError::UnknownSource(url.to_string()));
        };

        Ok(Self {
            url: url.to_string(),
            source,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// The source the URL belongs to (never `Auto`).
    pub fn source(&self) -> SourcePreference {
        self.source
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_url() {
        let url = SourceUrl::parse("https://tidal.com/browse/track/12345").unwrap();
        assert_eq!(url.source(), SourcePreference::PrimaryOnly);
        assert_eq!(url.as_str(), "https://tidal.com/browse/track/12345");
    }

    #[test]
    fn test_secondary_url_is_trimmed() {
        let url = SourceUrl::parse("  https://soundcloud.com/artist/song \n").unwrap();
        assert_eq!(url.source(), SourcePreference::SecondaryOnly);
        assert_eq!(url.to_string(), "https://soundcloud.com/artist/song");
    }

    #[test]
    fn test_rejects_unknown_domain() {
        let err = SourceUrl::parse("https://example.com/song").unwrap_err();
        assert!(matches!(err, SourceUrlError::UnknownSource(_)));
    }

    #[test]
    fn test_rejects_missing_scheme() {
        let err = SourceUrl::parse("tidal.com/browse/track/1").unwrap_err();
        assert!(matches!(err, SourceUrlError::BadScheme(_)));
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(SourceUrl::parse("   ").unwrap_err(), SourceUrlError::Empty);
    }
}
