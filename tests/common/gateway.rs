use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hifi_remedy::remediation::{
    GatewayError, ReplacementCandidate, ReplacementGateway, SourcePreference, SourceUrl,
};
use tokio::time::Instant;

/// One scripted gateway answer.
#[derive(Debug, Clone)]
pub enum Scripted {
    Candidate {
        original_secs: f64,
        new_secs: f64,
    },
    NoCandidate,
    Capacity,
    Failure(String),
}

impl Scripted {
    pub fn candidate(original_secs: f64, new_secs: f64) -> Self {
        Scripted::Candidate {
            original_secs,
            new_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallKind {
    Search(SourcePreference),
    Url(String),
}

#[derive(Debug, Clone)]
pub struct GatewayCall {
    pub path: String,
    pub kind: CallKind,
    pub at: Instant,
}

/// [`ReplacementGateway`] replaying queued answers per path.
///
/// Paths with nothing queued answer [`Scripted::NoCandidate`]. Every call is
/// recorded with its (tokio) start time, and the highest number of calls
/// running at once is tracked.
pub struct ScriptedGateway {
    script: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<GatewayCall>>,
    delay: Option<Duration>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    /// Every call takes `delay` before answering.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Self::build(Some(delay))
    }

    fn build(delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    pub fn push(&self, path: &str, answer: Scripted) {
        self.script
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(answer);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, path: &str) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.path == path)
            .collect()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn answer(
        &self,
        path: &Path,
        kind: CallKind,
    ) -> Result<Option<ReplacementCandidate>, GatewayError> {
        let key = path.to_string_lossy().to_string();
        self.calls.lock().unwrap().push(GatewayCall {
            path: key.clone(),
            kind,
            at: Instant::now(),
        });

        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Scripted::NoCandidate);

        match next {
            Scripted::Candidate {
                original_secs,
                new_secs,
            } => Ok(Some(ReplacementCandidate {
                original_path: path.to_path_buf(),
                new_path: candidate_path(path),
                original_duration_secs: original_secs,
                new_duration_secs: new_secs,
                cover_url: Some("https://img.example/cover.jpg".to_string()),
                new_bitrate: Some(1411),
            })),
            Scripted::NoCandidate => Ok(None),
            Scripted::Capacity => Err(GatewayError::CapacityExceeded(
                "Server is busy, try again later".to_string(),
            )),
            Scripted::Failure(message) => Err(GatewayError::Failure(message)),
        }
    }
}

/// Where the fake pretends the download landed.
pub fn candidate_path(original: &Path) -> PathBuf {
    original.with_extension("candidate.flac")
}

#[async_trait]
impl ReplacementGateway for ScriptedGateway {
    async fn request_replacement(
        &self,
        path: &Path,
        source: SourcePreference,
    ) -> Result<Option<ReplacementCandidate>, GatewayError> {
        self.answer(path, CallKind::Search(source)).await
    }

    async fn download_from_url(
        &self,
        path: &Path,
        url: &SourceUrl,
    ) -> Result<Option<ReplacementCandidate>, GatewayError> {
        self.answer(path, CallKind::Url(url.as_str().to_string()))
            .await
    }
}
