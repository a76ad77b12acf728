use serde::Serialize;

/// One of the two compared sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Track {
    /// Reference (the original file).
    A,
    /// Candidate (the replacement).
    B,
}

impl Track {
    pub fn other(self) -> Track {
        match self {
            Track::A => Track::B,
            Track::B => Track::A,
        }
    }
}

/// A playable media source the player can steer.
///
/// Times are in seconds. Implementations clamp positions to their duration.
pub trait MediaHandle: Send {
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, secs: f64);
    fn duration(&self) -> f64;
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64);
    fn is_muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    /// Returns true once the playhead reached the end.
    fn has_ended(&self) -> bool;
}
