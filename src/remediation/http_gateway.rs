//! HTTP client for the remote matching/download service.
//!
//! A replacement request is three calls: search for the track, ask the service
//! to fetch it, then stream the produced file next to the original.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::gateway::{GatewayError, ReplacementGateway};
use super::media_probe::{MediaProbe, ProbeReport, TrackMetadata};
use super::models::{ReplacementCandidate, SourcePreference};
use super::source_url::SourceUrl;

const CLIENT_TOKEN_HEADER: &str = "X-Client-Token";
const QUEUE_FULL_CODE: &str = "QUEUE_FULL";
const FALLBACK_FILENAME: &str = "downloaded.mp3";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    metadata: &'a TrackMetadata,
    source: &'a str,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SearchResponse {
    success: bool,
    found: bool,
    url: Option<String>,
    source: Option<String>,
    score: Option<f64>,
    cover_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct DownloadRequest<'a> {
    url: &'a str,
    source: &'a str,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    #[serde(rename = "downloadUrl")]
    download_url: Option<String>,
    filename: Option<String>,
    #[serde(default)]
    metadata: Option<DownloadMetadata>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DownloadMetadata {
    thumbnail: Option<String>,
    cover_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ErrorBody {
    code: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

/// A confident search hit.
struct SearchHit {
    url: String,
    source: &'static str,
    cover_url: Option<String>,
}

/// [`ReplacementGateway`] talking to the remote service over HTTP.
pub struct HttpReplacementGateway {
    client: Client,
    base_url: String,
    client_token: Option<String>,
    probe: Arc<dyn MediaProbe>,
}

impl HttpReplacementGateway {
    /// Create a new gateway.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the service (e.g., "http://localhost:8000")
    /// * `client_token` - Sent as `X-Client-Token` on every request when set
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: String,
        client_token: Option<String>,
        timeout: Duration,
        probe: Arc<dyn MediaProbe>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_token,
            probe,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.client_token {
            Some(token) => request.header(CLIENT_TOKEN_HEADER, token),
            None => request,
        }
    }

    async fn probe_or_default(&self, path: &Path) -> ProbeReport {
        match self.probe.probe(path).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Could not probe {:?}: {:#}", path, e);
                ProbeReport::default()
            }
        }
    }

    // =========================================================================
    // Remote calls
    // =========================================================================

    async fn search(
        &self,
        query: &str,
        metadata: &TrackMetadata,
        source: SourcePreference,
    ) -> Result<Option<SearchHit>, GatewayError> {
        let url = format!("{}/search/track", self.base_url);
        let body = SearchRequest {
            query,
            metadata,
            source: source.as_str(),
        };
        let response = self
            .authorized(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Failure(format!("Invalid search response: {}", e)))?;

        if !(search.success && search.found) {
            return Ok(None);
        }
        let Some(hit_url) = search.url else {
            return Ok(None);
        };

        let hit_source = match search.source.as_deref() {
            Some("soundcloud") => SourcePreference::SecondaryOnly.as_str(),
            _ => SourcePreference::PrimaryOnly.as_str(),
        };
        info!(
            "Search hit on {} (score {:.2}): {}",
            hit_source,
            search.score.unwrap_or(0.0),
            hit_url
        );
        Ok(Some(SearchHit {
            url: hit_url,
            source: hit_source,
            cover_url: search.cover_url.as_deref().and_then(clean_cover_url),
        }))
    }

    /// Ask the service to fetch `url`, then pull the file next to `original`.
    async fn download(
        &self,
        original: &Path,
        url: &str,
        source: &str,
        mut cover_url: Option<String>,
        original_report: ProbeReport,
    ) -> Result<ReplacementCandidate, GatewayError> {
        let endpoint = format!("{}/download", self.base_url);
        let response = self
            .authorized(
                self.client
                    .post(&endpoint)
                    .json(&DownloadRequest { url, source }),
            )
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;

        let download: DownloadResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Failure(format!("Invalid download response: {}", e)))?;
        let relative = download.download_url.ok_or_else(|| {
            GatewayError::Failure("Download response has no downloadUrl".to_string())
        })?;

        if cover_url.is_none() {
            cover_url = download
                .metadata
                .and_then(|m| m.thumbnail.or(m.cover_url))
                .as_deref()
                .and_then(clean_cover_url);
        }

        let dest = candidate_path(original, download.filename.as_deref());
        self.fetch_file(&self.file_url(&relative), &dest).await?;

        let new_report = self.probe_or_default(&dest).await;
        Ok(ReplacementCandidate {
            original_path: original.to_path_buf(),
            new_path: dest,
            original_duration_secs: original_report.duration_secs.unwrap_or(0.0),
            new_duration_secs: new_report.duration_secs.unwrap_or(0.0),
            cover_url,
            new_bitrate: new_report.bitrate_kbps,
        })
    }

    fn file_url(&self, relative: &str) -> String {
        if relative.starts_with("http://") || relative.starts_with("https://") {
            relative.to_string()
        } else if relative.starts_with('/') {
            format!("{}{}", self.base_url, relative)
        } else {
            format!("{}/{}", self.base_url, relative)
        }
    }

    async fn fetch_file(&self, url: &str, dest: &Path) -> Result<(), GatewayError> {
        debug!("Fetching {} into {:?}", url, dest);
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;

        if let Err(e) = write_stream(response, dest).await {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(e);
        }
        info!("Downloaded candidate to {:?}", dest);
        Ok(())
    }
}

#[async_trait]
impl ReplacementGateway for HttpReplacementGateway {
    async fn request_replacement(
        &self,
        path: &Path,
        source: SourcePreference,
    ) -> Result<Option<ReplacementCandidate>, GatewayError> {
        let query = search_query(path)
            .ok_or_else(|| GatewayError::Failure(format!("Invalid file name: {:?}", path)))?;
        let report = self.probe_or_default(path).await;
        info!("Searching {} for '{}'", source.as_str(), query);

        let Some(hit) = self.search(&query, &report.metadata, source).await? else {
            info!("No confident match for '{}'", query);
            return Ok(None);
        };

        self.download(path, &hit.url, hit.source, hit.cover_url, report)
            .await
            .map(Some)
    }

    async fn download_from_url(
        &self,
        path: &Path,
        url: &SourceUrl,
    ) -> Result<Option<ReplacementCandidate>, GatewayError> {
        let report = self.probe_or_default(path).await;
        self.download(path, url.as_str(), url.source().as_str(), None, report)
            .await
            .map(Some)
    }
}

async fn write_stream(response: Response, dest: &Path) -> Result<(), GatewayError> {
    let io_error = |e: std::io::Error| {
        GatewayError::Failure(format!("Failed to write {:?}: {}", dest, e))
    };

    let mut file = tokio::fs::File::create(dest).await.map_err(io_error)?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(transport_error)?;
        file.write_all(&chunk).await.map_err(io_error)?;
    }
    file.flush().await.map_err(io_error)?;
    file.sync_all().await.map_err(io_error)?;
    Ok(())
}

async fn ensure_success(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_error_response(status, &body))
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Failure(format!("Request timed out: {}", e))
    } else {
        GatewayError::Failure(format!("Request failed: {}", e))
    }
}

/// Map a non-2xx response to its error class.
fn classify_error_response(status: StatusCode, body: &str) -> GatewayError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let detail = parsed
        .error
        .or(parsed.message)
        .unwrap_or_else(|| body.trim().to_string());

    if status == StatusCode::SERVICE_UNAVAILABLE && parsed.code.as_deref() == Some(QUEUE_FULL_CODE)
    {
        let detail = if detail.is_empty() {
            "server queue is full".to_string()
        } else {
            detail
        };
        return GatewayError::CapacityExceeded(detail);
    }
    if status == StatusCode::UNAUTHORIZED {
        return GatewayError::Failure(format!("Authentication required (401): {}", detail));
    }
    GatewayError::Failure(format!("API Error ({}): {}", status.as_u16(), detail))
}

/// Build the search query from the file stem: at most the first two
/// ` - `-separated segments (`Artist - Title`).
fn search_query(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?.trim();
    if stem.is_empty() {
        return None;
    }
    let query = stem.split(" - ").take(2).collect::<Vec<_>>().join(" - ");
    if query.trim().is_empty() {
        Some(stem.to_string())
    } else {
        Some(query)
    }
}

/// Destination for a downloaded candidate, never equal to `original`.
fn candidate_path(original: &Path, filename: Option<&str>) -> PathBuf {
    let parent = original.parent().unwrap_or_else(|| Path::new("."));
    let name = filename
        .and_then(|f| Path::new(f).file_name())
        .map(|f| f.to_owned())
        .unwrap_or_else(|| FALLBACK_FILENAME.into());
    let dest = parent.join(&name);
    if dest != original {
        return dest;
    }

    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match dest.extension() {
        Some(ext) => parent.join(format!("{}.candidate.{}", stem, ext.to_string_lossy())),
        None => parent.join(format!("{}.candidate", stem)),
    }
}

/// Strip a CSS `url(...)` wrapper and surrounding quotes from a cover URL.
fn clean_cover_url(raw: &str) -> Option<String> {
    let mut url = raw.trim();
    if let Some(inner) = url.strip_prefix("url(").and_then(|u| u.strip_suffix(')')) {
        url = inner.trim();
    }
    let url = url.trim_matches(|c| c == '"' || c == '\'').trim();
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}
