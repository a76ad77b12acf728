//! Dual-handle player for A/B comparison.

use serde::Serialize;
use tracing::{debug, info};

use super::drift::{Correction, DriftPolicy};
use super::media::{MediaHandle, Track};

/// What a correction tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not playing; nothing to correct.
    Idle,
    /// A seek just happened; this tick was skipped.
    SkippedAfterSeek,
    /// One handle reached its end; both were stopped and rewound.
    Ended,
    Corrected(Correction),
}

/// Transport state for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub active: Track,
    pub is_playing: bool,
    /// Position of the audible handle.
    pub current_time: f64,
    /// Longest of the two durations.
    pub duration: f64,
    pub label_a: String,
    pub label_b: String,
}

/// Plays two handles in lock-step with exactly one of them audible.
pub struct SyncPlayer<M: MediaHandle> {
    a: M,
    b: M,
    label_a: String,
    label_b: String,
    active: Track,
    is_playing: bool,
    skip_next_tick: bool,
    policy: DriftPolicy,
}

impl<M: MediaHandle> SyncPlayer<M> {
    /// Load both handles with the candidate (B) audible.
    pub fn new(
        mut a: M,
        mut b: M,
        label_a: impl Into<String>,
        label_b: impl Into<String>,
        policy: DriftPolicy,
    ) -> Self {
        a.set_muted(true);
        b.set_muted(false);
        for handle in [&mut a, &mut b] {
            handle.pause();
            handle.set_playback_rate(1.0);
        }
        Self {
            a,
            b,
            label_a: label_a.into(),
            label_b: label_b.into(),
            active: Track::B,
            is_playing: false,
            skip_next_tick: false,
            policy,
        }
    }

    pub fn active_track(&self) -> Track {
        self.active
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn handle(&self, track: Track) -> &M {
        match track {
            Track::A => &self.a,
            Track::B => &self.b,
        }
    }

    pub fn handle_mut(&mut self, track: Track) -> &mut M {
        match track {
            Track::A => &mut self.a,
            Track::B => &mut self.b,
        }
    }

    /// Position of the audible handle.
    pub fn current_time(&self) -> f64 {
        self.handle(self.active).current_time()
    }

    pub fn duration(&self) -> f64 {
        self.a.duration().max(self.b.duration())
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            active: self.active,
            is_playing: self.is_playing,
            current_time: self.current_time(),
            duration: self.duration(),
            label_a: self.label_a.clone(),
            label_b: self.label_b.clone(),
        }
    }

    /// Pause both handles, or resume both after aligning the muted one once.
    pub fn toggle_play(&mut self) {
        if self.is_playing {
            self.a.pause();
            self.b.pause();
            self.is_playing = false;
            debug!("Paused at {:.3}s", self.current_time());
            return;
        }

        let master_time = self.current_time();
        let passive = self.active.other();
        let follower = self.handle_mut(passive);
        follower.set_current_time(master_time);
        self.reset_rates();
        self.a.play();
        self.b.play();
        self.is_playing = true;
        debug!("Resumed at {:.3}s", master_time);
    }

    /// Make `track` the audible one. Positions are left untouched.
    pub fn switch_track(&mut self, track: Track) {
        if self.active == track {
            return;
        }
        self.active = track;
        self.a.set_muted(track != Track::A);
        self.b.set_muted(track != Track::B);
        debug!("Switched audible track to {:?}", track);
    }

    /// Move both handles to `fraction` of the duration.
    pub fn seek(&mut self, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let target = fraction * self.duration();
        self.a.set_current_time(target);
        self.b.set_current_time(target);
        self.skip_next_tick = true;
        debug!("Seeked to {:.3}s", target);
    }

    /// Stop both handles and rewind them when either one finishes.
    pub fn on_ended(&mut self) {
        self.a.pause();
        self.b.pause();
        self.a.set_current_time(0.0);
        self.b.set_current_time(0.0);
        self.reset_rates();
        self.is_playing = false;
        info!("Playback ended, rewound both tracks");
    }

    /// Run one drift correction step.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_playing {
            return TickOutcome::Idle;
        }
        if self.skip_next_tick {
            self.skip_next_tick = false;
            return TickOutcome::SkippedAfterSeek;
        }
        if self.a.has_ended() || self.b.has_ended() {
            self.on_ended();
            return TickOutcome::Ended;
        }

        let master_time = self.current_time();
        let passive = self.active.other();
        let passive_time = self.handle(passive).current_time();
        let correction = self.policy.evaluate(master_time, passive_time);

        match correction {
            Correction::Snap => {
                info!(
                    "Hard desync of {:.3}s, snapping {:?} to {:.3}s",
                    passive_time - master_time,
                    passive,
                    master_time
                );
                self.handle_mut(passive).set_current_time(master_time);
                self.reset_rates();
            }
            Correction::Nudge { rate } => {
                debug!(
                    "Drift of {:.3}s, {:?} at rate {}",
                    passive_time - master_time,
                    passive,
                    rate
                );
                let active = self.active;
                self.handle_mut(active).set_playback_rate(1.0);
                self.handle_mut(passive).set_playback_rate(rate);
            }
            Correction::InSync => self.reset_rates(),
        }
        TickOutcome::Corrected(correction)
    }

    fn reset_rates(&mut self) {
        self.a.set_playback_rate(1.0);
        self.b.set_playback_rate(1.0);
    }
}
