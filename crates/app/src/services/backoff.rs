//! Exponential reconnect backoff.

use std::time::Duration;

/// Doubling delay between `min` and `max`.
///
/// Consecutive calls to [`next_delay`](Self::next_delay) never decrease;
/// [`reset`](Self::reset) goes back to `min` after a successful publish.
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// `max` below `min` is raised to `min`.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            current: min,
        }
    }

    /// Delay to wait before the next attempt, then double it for the one after.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }

    /// Delay the next call to [`next_delay`](Self::next_delay) will return.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }
}
