//! Retry budget for optimistic tab transactions.

use rand::Rng;
use std::time::Duration;

/// How often, and how patiently, a conflicting transaction is retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,

    /// Backoff ceiling after the first conflict
    pub base_backoff: Duration,

    /// Upper bound for any single backoff
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff: max_backoff.max(base_backoff),
        }
    }

    /// Configuration from environment variables
    ///
    /// - `TAB_TX_MAX_ATTEMPTS` (default: 8)
    /// - `TAB_TX_BACKOFF_MS` (default: 5)
    /// - `TAB_TX_MAX_BACKOFF_MS` (default: 200)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self::new(
            std::env::var("TAB_TX_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_attempts),
            std::env::var("TAB_TX_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_backoff),
            std::env::var("TAB_TX_MAX_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
        )
    }

    /// Sleep before retry number `attempt` (1-based)
    ///
    /// Exponential ceiling with full jitter, so racing writers spread out.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let ceiling = self
            .base_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff);
        let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(0..=ceiling_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_least_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff(1), Duration::ZERO);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_millis(10), Duration::from_millis(50));
        for attempt in 1..=30 {
            assert!(policy.backoff(attempt) <= Duration::from_millis(50));
        }
        for _ in 0..50 {
            assert!(policy.backoff(1) <= Duration::from_millis(10));
        }
    }

    #[test]
    fn test_max_backoff_never_below_base() {
        let policy = RetryPolicy::new(3, Duration::from_millis(40), Duration::from_millis(10));
        assert_eq!(policy.max_backoff, Duration::from_millis(40));
    }
}
