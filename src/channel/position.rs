use std::time::Duration;
use tokio::time::Instant;

/// Playback position of a single channel.
///
/// Runs on the tokio clock so paused-time tests see consistent positions.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    /// Position at `anchor`, or the frozen position while paused
    position: Duration,
    /// Set while playing
    anchor: Option<Instant>,
    duration: Duration,
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionTracker {
    pub fn new() -> Self {
        Self {
            position: Duration::ZERO,
            anchor: None,
            duration: Duration::ZERO,
        }
    }

    /// Reset for a newly loaded stream, paused at the beginning
    pub fn load(&mut self, duration: Duration) {
        self.position = Duration::ZERO;
        self.anchor = None;
        self.duration = duration;
    }

    pub fn clear(&mut self) {
        self.load(Duration::ZERO);
    }

    /// Start advancing, optionally from a new position
    pub fn resume(&mut self, from: Option<Duration>) {
        if let Some(from) = from {
            self.position = from.min(self.duration);
        } else {
            self.position = self.current_position();
        }
        self.anchor = Some(Instant::now());
    }

    pub fn pause(&mut self) {
        self.position = self.current_position();
        self.anchor = None;
    }

    /// Move to `position`, keeping the running state. Positions past the end
    /// are rejected.
    pub fn seek(&mut self, position: Duration) -> Result<Duration, String> {
        if position > self.duration {
            return Err(format!(
                "Seek position {:.2}s exceeds stream duration {:.2}s",
                position.as_secs_f64(),
                self.duration.as_secs_f64()
            ));
        }

        self.position = position;
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
        Ok(position)
    }

    pub fn current_position(&self) -> Duration {
        match self.anchor {
            Some(anchor) => self.position.saturating_add(anchor.elapsed()).min(self.duration),
            None => self.position,
        }
    }

    pub fn is_running(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.current_position())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_position_advances_while_running() {
        let mut tracker = PositionTracker::new();
        tracker.load(Duration::from_secs(10));
        tracker.resume(None);

        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(tracker.current_position(), Duration::from_secs(3));
        assert_eq!(tracker.remaining(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_position() {
        let mut tracker = PositionTracker::new();
        tracker.load(Duration::from_secs(10));
        tracker.resume(Some(Duration::from_secs(2)));

        tokio::time::advance(Duration::from_secs(1)).await;
        tracker.pause();
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(tracker.current_position(), Duration::from_secs(3));
        assert!(!tracker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_clamped_to_duration() {
        let mut tracker = PositionTracker::new();
        tracker.load(Duration::from_secs(2));
        tracker.resume(None);

        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(tracker.current_position(), Duration::from_secs(2));
        assert_eq!(tracker.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_seek_past_end_rejected() {
        let mut tracker = PositionTracker::new();
        tracker.load(Duration::from_secs(60));

        assert!(tracker.seek(Duration::from_secs(61)).is_err());
        assert_eq!(tracker.seek(Duration::from_secs(30)).unwrap(), Duration::from_secs(30));
        assert_eq!(tracker.current_position(), Duration::from_secs(30));
    }
}
