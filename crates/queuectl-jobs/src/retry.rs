//! Retry policy for failed jobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff policy.
///
/// The delay before attempt `k` becomes eligible again is `base^k`
/// seconds. Growth is intentionally uncapped and unjittered: bounding the
/// total wait is done through `max_retries`, not through a delay ceiling.
/// With the default base of 2 the delays climb fast (attempt 20 waits
/// over 12 days) — a known scalability caveat of the policy, not a bug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Exponential base.
    #[serde(default = "default_base")]
    pub base: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: default_base(),
        }
    }
}

fn default_base() -> u32 {
    2
}

impl RetryPolicy {
    /// Creates a policy with the given base.
    #[must_use]
    pub fn new(base: u32) -> Self {
        Self { base }
    }

    /// Delay before the job becomes eligible again after `attempts`
    /// failed executions: `base^attempts` seconds, saturating.
    #[must_use]
    pub fn next_delay(&self, attempts: u32) -> Duration {
        Duration::from_secs(u64::from(self.base).saturating_pow(attempts))
    }

    /// Whether a job with `attempts` executions may still be retried.
    #[must_use]
    pub fn should_retry(&self, attempts: u32, max_retries: u32) -> bool {
        attempts <= max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_is_base_to_the_attempts() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.next_delay(1), Duration::from_secs(2));
        assert_eq!(policy.next_delay(2), Duration::from_secs(4));
        assert_eq!(policy.next_delay(3), Duration::from_secs(8));
        assert_eq!(policy.next_delay(10), Duration::from_secs(1024));
    }

    #[test]
    fn test_delay_monotonically_increasing() {
        let policy = RetryPolicy::default();
        for k in 1..32 {
            assert!(policy.next_delay(k + 1) > policy.next_delay(k));
        }
    }

    #[test]
    fn test_custom_base() {
        let policy = RetryPolicy::new(3);
        assert_eq!(policy.next_delay(2), Duration::from_secs(9));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(200), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_should_retry_boundary() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(1, 2));
        assert!(policy.should_retry(2, 2));
        assert!(!policy.should_retry(3, 2));
        assert!(!policy.should_retry(1, 0));
    }
}
