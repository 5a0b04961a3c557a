use std::time::Duration;

/// Bounded fixed-interval reconnection. The attempt counter increments on
/// every scheduled retry and resets when a connection opens.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    interval: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    /// Delay before the next attempt, or `None` once retries are exhausted.
    pub fn on_close(&mut self) -> Option<Duration> {
        if self.attempts < self.max_attempts {
            self.attempts += 1;
            Some(self.interval)
        } else {
            None
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fourth_close_schedules_nothing() {
        let mut p = ReconnectPolicy::new(Duration::from_millis(3000), 3);
        for expected in 1..=3 {
            assert_eq!(p.on_close(), Some(Duration::from_millis(3000)));
            assert_eq!(p.attempts(), expected);
        }
        assert!(p.is_exhausted());
        assert_eq!(p.on_close(), None);
        assert_eq!(p.on_close(), None);
    }

    #[test]
    fn test_open_resets_counter() {
        let mut p = ReconnectPolicy::new(Duration::from_millis(10), 2);
        p.on_close();
        p.on_close();
        p.on_open();
        assert_eq!(p.attempts(), 0);
        assert!(p.on_close().is_some());
    }

    #[test]
    fn test_zero_attempts_never_retries() {
        let mut p = ReconnectPolicy::new(Duration::from_millis(10), 0);
        assert_eq!(p.on_close(), None);
    }

    proptest! {
        #[test]
        fn prop_retries_bounded(max in 0u32..20, closes in 0u32..40) {
            let mut p = ReconnectPolicy::new(Duration::from_millis(1), max);
            let scheduled = (0..closes).filter(|_| p.on_close().is_some()).count() as u32;
            prop_assert_eq!(scheduled, closes.min(max));
        }
    }
}
