//! Playback session owning the player and its correction timer.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::media::{MediaHandle, Track};
use super::player::{PlaybackSnapshot, SyncPlayer};

type SharedPlayer<M> = Arc<Mutex<SyncPlayer<M>>>;

fn lock<M: MediaHandle>(player: &SharedPlayer<M>) -> MutexGuard<'_, SyncPlayer<M>> {
    // A poisoned lock only means a previous tick panicked; the state is still usable
    player.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Periodic task running [`SyncPlayer::tick`].
///
/// Created once per session. Stopping it (or dropping it) ends the task; it
/// is never restarted.
pub struct CorrectionTimer {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CorrectionTimer {
    fn spawn<M: MediaHandle + 'static>(player: SharedPlayer<M>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        lock(&player).tick();
                    }
                }
            }
            debug!("Correction timer stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for CorrectionTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// A/B comparison session: the player plus its drift correction timer.
///
/// Must be started inside a tokio runtime.
pub struct SyncSession<M: MediaHandle + 'static> {
    player: SharedPlayer<M>,
    timer: CorrectionTimer,
}

impl<M: MediaHandle + 'static> SyncSession<M> {
    /// Take ownership of `player` and start correcting every `tick`.
    pub fn start(player: SyncPlayer<M>, tick: Duration) -> Self {
        let player = Arc::new(Mutex::new(player));
        let timer = CorrectionTimer::spawn(player.clone(), tick);
        info!("Sync session started (tick={}ms)", tick.as_millis());
        Self { player, timer }
    }

    /// Run `f` with exclusive access to the player.
    pub fn with_player<R>(&self, f: impl FnOnce(&mut SyncPlayer<M>) -> R) -> R {
        f(&mut lock(&self.player))
    }

    pub fn toggle_play(&self) {
        self.with_player(|p| p.toggle_play());
    }

    pub fn switch_track(&self, track: Track) {
        self.with_player(|p| p.switch_track(track));
    }

    pub fn seek(&self, fraction: f64) {
        self.with_player(|p| p.seek(fraction));
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.with_player(|p| p.snapshot())
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Stop the timer and pause playback.
    pub async fn shutdown(mut self) {
        self.timer.stop().await;
        self.with_player(|p| {
            if p.is_playing() {
                p.toggle_play();
            }
        });
        info!("Sync session closed");
    }
}
