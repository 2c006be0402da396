// Bounded retry with exponential backoff.
//
// The controller drops requests under load and has no server-side retry,
// so every command is attempted up to `max_attempts` times. There is no
// jitter: a single client talks to a single controller.

use std::time::Duration;

/// Retry schedule for controller commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default: 3.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each later retry. Default: 1s.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt` (zero-based):
    /// `base_delay * 2^attempt`.
    ///
    /// Returns `None` after the final attempt -- the caller gives up
    /// immediately instead of sleeping.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        Some(self.base_delay.saturating_mul(2_u32.saturating_pow(attempt)))
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_is_one_then_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(0), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay_after(2), None);
    }

    #[test]
    fn no_retry_never_sleeps() {
        assert_eq!(RetryPolicy::no_retry().delay_after(0), None);
    }

    #[test]
    fn large_attempt_counts_saturate() {
        let policy = RetryPolicy {
            max_attempts: u32::MAX,
            base_delay: Duration::from_secs(1),
        };
        assert!(policy.delay_after(40).is_some());
    }
}
