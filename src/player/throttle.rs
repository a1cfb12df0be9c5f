use std::time::Duration;
use tokio::time::Instant;

/// Collapses a burst of values into the last one.
///
/// The first value opens a window; values pushed while it is open replace
/// the pending one. When the window closes the latest value is due.
#[derive(Debug)]
pub struct TrailingThrottle<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> TrailingThrottle<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        match &mut self.pending {
            Some((_, pending)) => *pending = value,
            None => self.pending = Some((now + self.window, value)),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|(_, value)| value)
    }

    /// Take the pending value once its window has closed
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((deadline, _)) if deadline <= now => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }
}

/// Lets the first event of a window through and drops the rest
#[derive(Debug)]
pub struct LeadingThrottle {
    window: Duration,
    last: Option<Instant>,
}

impl LeadingThrottle {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now < last + self.window {
                return false;
            }
        }
        self.last = Some(now);
        true
    }

    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    #[test]
    fn test_trailing_keeps_last_value() {
        let start = Instant::now();
        let mut throttle = TrailingThrottle::new(WINDOW);

        throttle.push(1, start);
        throttle.push(2, start + Duration::from_millis(100));
        throttle.push(3, start + Duration::from_millis(400));

        assert_eq!(throttle.deadline(), Some(start + WINDOW));
        assert_eq!(throttle.take_due(start + Duration::from_millis(499)), None);
        assert_eq!(throttle.take_due(start + WINDOW), Some(3));
        assert_eq!(throttle.deadline(), None);
    }

    #[test]
    fn test_trailing_new_window_after_fire() {
        let start = Instant::now();
        let mut throttle = TrailingThrottle::new(WINDOW);

        throttle.push("a", start);
        throttle.take_due(start + WINDOW);
        throttle.push("b", start + Duration::from_millis(600));

        assert_eq!(throttle.deadline(), Some(start + Duration::from_millis(1100)));
        assert_eq!(throttle.pending(), Some(&"b"));
    }

    #[test]
    fn test_leading_drops_repeats_inside_window() {
        let start = Instant::now();
        let mut throttle = LeadingThrottle::new(WINDOW);

        assert!(throttle.accept(start));
        assert!(!throttle.accept(start + Duration::from_millis(10)));
        assert!(!throttle.accept(start + Duration::from_millis(499)));
        assert!(throttle.accept(start + WINDOW));
    }
}
