//! Backoff policy for transient model errors.
//!
//! Retries are off unless asked for (`--retries N`). Which errors count as
//! transient is decided by [`ModelError::is_transient`](crate::ModelError::is_transient);
//! this module only decides how long to wait.

use std::time::Duration;

use rand::Rng;

/// How many times a stage call is retried and how long to wait between tries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt. 0 fails on the first error.
    pub max_retries: u32,
    /// Wait before the first retry. Doubles for every retry after that.
    pub base_delay: Duration,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
    /// Scale each wait by a random factor in `[0.5, 1.0]` so concurrent
    /// runs that failed together do not retry together.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Whether another attempt is allowed after `attempt` retries.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Wait before retry number `attempt` (0-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let doubled = self
            .base_delay
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = doubled.min(self.max_delay);
        if self.jitter {
            capped.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
        } else {
            capped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed() -> RetryConfig {
        RetryConfig {
            jitter: false,
            ..RetryConfig::with_retries(5)
        }
    }

    #[test]
    fn retries_are_off_by_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 0);
        assert!(!config.allows(0));
    }

    #[test]
    fn allows_up_to_max_retries() {
        let config = RetryConfig::with_retries(2);
        assert!(config.allows(0));
        assert!(config.allows(1));
        assert!(!config.allows(2));
    }

    #[test]
    fn backoff_doubles_without_jitter() {
        let config = fixed();
        assert_eq!(config.backoff(0), Duration::from_millis(500));
        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(2),
            ..fixed()
        };
        assert_eq!(config.backoff(10), Duration::from_secs(2));
        assert_eq!(config.backoff(40), Duration::from_secs(2));
    }

    #[test]
    fn jittered_backoff_stays_within_half_to_full() {
        let config = RetryConfig::with_retries(3);
        for _ in 0..200 {
            let delay = config.backoff(1);
            assert!(delay >= Duration::from_millis(500), "{delay:?}");
            assert!(delay <= Duration::from_secs(1), "{delay:?}");
        }
    }

    #[test]
    fn jittered_backoff_varies() {
        let config = RetryConfig::with_retries(3);
        let delays: std::collections::HashSet<Duration> =
            (0..50).map(|_| config.backoff(2)).collect();
        assert!(delays.len() > 1);
    }
}
