use std::time::Duration;
use tokio::time::Instant;

/// Minimum spacing between two motion events
#[derive(Debug, Clone)]
pub struct Debounce {
    interval: Duration,
    expiry: Instant,
}

impl Debounce {
    /// The window starts closed for one interval after `start`
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            expiry: start + interval,
        }
    }

    pub fn is_open(&self, now: Instant) -> bool {
        now >= self.expiry
    }

    /// Close the window for one interval from `now`
    pub fn arm(&mut self, now: Instant) {
        self.expiry = now + self.interval;
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.expiry.saturating_duration_since(now)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_starts_closed() {
        let start = Instant::now();
        let debounce = Debounce::new(Duration::from_millis(500), start);

        assert!(!debounce.is_open(start));
        assert!(!debounce.is_open(start + Duration::from_millis(499)));
        assert!(debounce.is_open(start + Duration::from_millis(500)));
    }

    #[test]
    fn test_arm_uses_configured_interval_every_time() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_millis(200), start);

        let first = start + Duration::from_millis(250);
        debounce.arm(first);
        assert_eq!(debounce.remaining(first), Duration::from_millis(200));
        assert!(!debounce.is_open(first + Duration::from_millis(199)));
        assert!(debounce.is_open(first + Duration::from_millis(200)));

        let second = first + Duration::from_millis(300);
        debounce.arm(second);
        assert_eq!(debounce.remaining(second), Duration::from_millis(200));
    }

    #[test]
    fn test_remaining_saturates() {
        let start = Instant::now();
        let debounce = Debounce::new(Duration::from_millis(10), start);

        assert_eq!(
            debounce.remaining(start + Duration::from_secs(1)),
            Duration::ZERO
        );
        assert_eq!(debounce.interval(), Duration::from_millis(10));
    }
}
