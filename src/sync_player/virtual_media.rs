//! Clock-driven [`MediaHandle`] without a decoder behind it.

use tokio::time::Instant;

use super::media::MediaHandle;

/// A media handle whose position advances with the tokio clock.
///
/// While playing, the position moves at `rate` seconds per second and stops at
/// the duration. Under a paused test clock it only moves when time is advanced.
#[derive(Debug, Clone)]
pub struct VirtualMedia {
    duration: f64,
    /// Position at `anchor`, or the current position while paused.
    position: f64,
    /// Set while playing.
    anchor: Option<Instant>,
    rate: f64,
    muted: bool,
}

impl VirtualMedia {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration: duration_secs.max(0.0),
            position: 0.0,
            anchor: None,
            rate: 1.0,
            muted: false,
        }
    }

    /// Fold elapsed playback into `position` and restart the anchor.
    fn rebase(&mut self) {
        if self.anchor.is_some() {
            self.position = self.current_time();
            self.anchor = Some(Instant::now());
        }
    }
}

impl MediaHandle for VirtualMedia {
    fn current_time(&self) -> f64 {
        match self.anchor {
            Some(anchor) => {
                let elapsed = anchor.elapsed().as_secs_f64();
                (self.position + elapsed * self.rate).min(self.duration)
            }
            None => self.position,
        }
    }

    fn set_current_time(&mut self, secs: f64) {
        self.position = secs.clamp(0.0, self.duration);
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn playback_rate(&self) -> f64 {
        self.rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rebase();
        self.rate = rate;
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn play(&mut self) {
        if self.anchor.is_none() {
            self.anchor = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.position = self.current_time();
        self.anchor = None;
    }

    fn is_paused(&self) -> bool {
        self.anchor.is_none()
    }

    fn has_ended(&self) -> bool {
        self.duration > 0.0 && self.current_time() >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[tokio::test(start_paused = true)]
    async fn test_advances_only_while_playing() {
        let mut media = VirtualMedia::new(10.0);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(media.current_time(), 0.0);

        media.play();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(approx(media.current_time(), 2.0));

        media.pause();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(approx(media.current_time(), 2.0));
        assert!(media.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_changes_speed() {
        let mut media = VirtualMedia::new(100.0);
        media.play();
        tokio::time::advance(Duration::from_secs(1)).await;
        media.set_playback_rate(0.5);
        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(approx(media.current_time(), 2.0));
        assert_eq!(media.playback_rate(), 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ends_at_duration() {
        let mut media = VirtualMedia::new(3.0);
        media.set_current_time(2.5);
        media.play();
        assert!(!media.has_ended());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(approx(media.current_time(), 3.0));
        assert!(media.has_ended());
    }

    #[test]
    fn test_seek_is_clamped() {
        let mut media = VirtualMedia::new(5.0);
        media.set_current_time(9.0);
        assert_eq!(media.current_time(), 5.0);
        media.set_current_time(-1.0);
        assert_eq!(media.current_time(), 0.0);
    }
}
