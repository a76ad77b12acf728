//! Drift policy between the audible and the muted handle.
//!
//! The audible handle is the master and always plays at rate 1.0. Only the
//! muted handle is nudged or snapped, so corrections are never heard.

/// Thresholds and nudge size used by [`DriftPolicy::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftPolicy {
    /// At or below this absolute drift both handles play at 1.0.
    pub in_sync_secs: f64,
    /// Above this absolute drift the muted handle is snapped.
    ///
    /// Defaults to 0.75 s rather than 0.5 s, so a 0.6 s gap is still nudged
    /// back smoothly and only a gap past 0.75 s causes an audible jump.
    pub hard_desync_secs: f64,
    /// Rate offset applied to the muted handle in between.
    pub rate_nudge: f64,
}

impl Default for DriftPolicy {
    fn default() -> Self {
        Self {
            in_sync_secs: 0.02,
            hard_desync_secs: 0.75,
            rate_nudge: 0.05,
        }
    }
}

/// What the muted handle should do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    InSync,
    /// Play the muted handle at `rate` until the gap closes.
    Nudge { rate: f64 },
    /// Move the muted handle to the audible handle's time.
    Snap,
}

impl DriftPolicy {
    /// Decide the correction for a muted handle at `passive_time` following an
    /// audible handle at `active_time`.
    pub fn evaluate(&self, active_time: f64, passive_time: f64) -> Correction {
        let diff = passive_time - active_time;
        let drift = diff.abs();

        if drift > self.hard_desync_secs {
            Correction::Snap
        } else if drift > self.in_sync_secs {
            // Ahead slows down, behind speeds up
            let rate = if diff > 0.0 {
                1.0 - self.rate_nudge
            } else {
                1.0 + self.rate_nudge
            };
            Correction::Nudge { rate }
        } else {
            Correction::InSync
        }
    }
}
