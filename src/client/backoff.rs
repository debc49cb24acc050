//! Bounded exponential backoff for reconnection attempts.
//!
//! `interval(n + 1) = min(interval(n) * 2, max_interval)`, with at most
//! `max_attempts` retries between two successful opens.

use std::time::Duration;

/// Parameters of the reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Retry ceiling. After this many consecutive failed attempts the
    /// supervisor gives up.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Upper bound on any single delay.
    pub max_interval: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_interval: Duration::from_millis(1000),
            max_interval: Duration::from_millis(30_000),
        }
    }
}

/// Mutable reconnect state: attempt count and the next delay.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: BackoffConfig,
    attempts: u32,
    interval: Duration,
}

impl ReconnectPolicy {
    /// A fresh policy with no attempts spent.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
            interval: config.initial_interval,
        }
    }

    /// Claims the next attempt.
    ///
    /// Returns the delay to wait before it, or `None` once the ceiling is
    /// reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        self.attempts += 1;
        let delay = self.interval.min(self.config.max_interval);
        self.interval = self
            .interval
            .saturating_mul(2)
            .min(self.config.max_interval);
        Some(delay)
    }

    /// Restores the initial state after a successful open.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.interval = self.config.initial_interval;
    }

    /// Attempts claimed since the last reset.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the ceiling has been reached.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// The policy parameters.
    #[must_use]
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(policy: &mut ReconnectPolicy) -> Vec<u64> {
        let mut delays = Vec::new();
        while let Some(delay) = policy.next_delay() {
            delays.push(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        }
        delays
    }

    #[test]
    fn default_schedule_doubles_and_stops_at_ceiling() {
        let mut policy = ReconnectPolicy::new(BackoffConfig::default());
        assert_eq!(drain(&mut policy), vec![1000, 2000, 4000, 8000, 16_000]);
        assert!(policy.is_exhausted());
        assert_eq!(policy.next_delay(), None);
        assert_eq!(policy.attempts(), 5);
    }

    #[test]
    fn interval_is_capped() {
        let mut policy = ReconnectPolicy::new(BackoffConfig {
            max_attempts: 5,
            initial_interval: Duration::from_millis(10_000),
            max_interval: Duration::from_millis(30_000),
        });
        assert_eq!(
            drain(&mut policy),
            vec![10_000, 20_000, 30_000, 30_000, 30_000]
        );
    }

    #[test]
    fn reset_restores_initial_interval() {
        let mut policy = ReconnectPolicy::new(BackoffConfig::default());
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        policy.reset();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn zero_ceiling_never_retries() {
        let mut policy = ReconnectPolicy::new(BackoffConfig {
            max_attempts: 0,
            ..BackoffConfig::default()
        });
        assert!(policy.is_exhausted());
        assert_eq!(policy.next_delay(), None);
    }
}
