//! Duration-based match classification.
//!
//! A candidate matches its original when the durations are close either in
//! absolute seconds or relative to the original's length. The two checks are
//! OR-ed, so short clips match through the absolute branch even when the
//! relative error is large.

/// Floor applied to the original duration before computing the relative diff.
const MIN_ORIGINAL_SECS: f64 = 1e-6;

/// Tolerances used by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationTolerance {
    /// Maximum absolute difference in seconds.
    pub max_diff_secs: f64,
    /// Maximum difference as a fraction of the original duration.
    pub max_relative: f64,
}

impl Default for DurationTolerance {
    fn default() -> Self {
        Self {
            max_diff_secs: 2.0,
            max_relative: 0.05,
        }
    }
}

/// Outcome of comparing two durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationVerdict {
    Match,
    Mismatch,
}

impl DurationVerdict {
    pub fn is_match(&self) -> bool {
        matches!(self, DurationVerdict::Match)
    }
}

/// Classify a candidate duration against the original one.
pub fn classify(original_secs: f64, new_secs: f64, tolerance: &DurationTolerance) -> DurationVerdict {
    let diff = (original_secs - new_secs).abs();
    let relative = diff / original_secs.max(MIN_ORIGINAL_SECS);

    if diff <= tolerance.max_diff_secs || relative <= tolerance.max_relative {
        DurationVerdict::Match
    } else {
        DurationVerdict::Mismatch
    }
}
