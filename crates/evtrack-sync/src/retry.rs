//! Backoff schedule for transient delivery failures
//!
//! The delay before attempt `n + 1` is `min(base * 2^n, max)`, where `n` is
//! the number of attempts already made. Once an entry has been tried
//! `max_attempts` times it is dead-lettered.

use std::time::Duration;

use evtrack_core::config::SyncConfig;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Builds the policy from the `sync` configuration section
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_secs(config.backoff_base_secs),
            Duration::from_secs(config.backoff_max_secs),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after `attempts` failed deliveries
    pub fn delay_for(&self, attempts: u32) -> Duration {
        // 2^31 seconds already dwarfs any sane cap
        let factor = 1u32.checked_shl(attempts.min(31)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Whether an entry that has now failed `attempts` times may try again
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_cap() {
        let policy = RetryPolicy::new(8, Duration::from_secs(2), Duration::from_secs(20));

        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
        assert_eq!(policy.delay_for(3), Duration::from_secs(16));
        assert_eq!(policy.delay_for(4), Duration::from_secs(20));
        assert_eq!(policy.delay_for(30), Duration::from_secs(20));
    }

    #[test]
    fn test_huge_attempt_count_saturates() {
        let policy = RetryPolicy::new(8, Duration::from_secs(600), Duration::from_secs(3600));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(3600));
    }

    #[test]
    fn test_allows_retry() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10));

        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.allows_retry(1));
    }

    #[test]
    fn test_from_default_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 8);
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(20), Duration::from_secs(600));
    }
}
