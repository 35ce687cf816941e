//! Backoff between failed status reads.
//!
//! The wait after the `n`-th consecutive failure is `base_delay * 2^(n-1)`:
//! a single hiccup costs one base delay, each further failure doubles it.

use std::time::Duration;

/// Default pause unit between retries.
pub const RETRY_DELAY: Duration = Duration::from_secs(60);
/// Default number of consecutive failed reads tolerated.
pub const RETRY_COUNT: u32 = 3;

/// Tunable parameters for the retry strategy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry; each later retry doubles it.
    pub base_delay: Duration,
    /// Failed reads allowed before giving up.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: RETRY_DELAY,
            max_attempts: RETRY_COUNT,
        }
    }
}

/// Delay to wait after the `attempt`-th consecutive failure (1-based).
pub fn delay_for_attempt(attempt: u32, config: &RetryConfig) -> Duration {
    let exponent = attempt.max(1) - 1;
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    config.base_delay.saturating_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_with_attempt() {
        let config = RetryConfig::default();
        assert_eq!(delay_for_attempt(1, &config), Duration::from_secs(60));
        assert_eq!(delay_for_attempt(2, &config), Duration::from_secs(120));
        assert_eq!(delay_for_attempt(3, &config), Duration::from_secs(240));
        assert_eq!(delay_for_attempt(4, &config), Duration::from_secs(480));
    }

    #[test]
    fn huge_attempt_saturates() {
        let config = RetryConfig::default();
        assert_eq!(delay_for_attempt(40, &config), Duration::from_secs(60 * u64::from(u32::MAX)));
        assert_eq!(delay_for_attempt(u32::MAX, &config), delay_for_attempt(40, &config));
    }

    #[test]
    fn attempt_zero_waits_one_unit() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(500),
            ..Default::default()
        };
        assert_eq!(delay_for_attempt(0, &config), Duration::from_millis(500));
    }
}
