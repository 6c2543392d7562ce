//! Retry policy for activity attempts

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activity::ActivityError;
use crate::workflow::millis;

/// How many times an activity may be attempted, and how long to wait between
/// attempts
///
/// Retries never show up in the run's history; the store tracks them on the
/// task row and only the final outcome is recorded.
///
/// # Example
///
/// ```
/// use flowgate_durable::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential()
///     .with_max_attempts(4)
///     .with_initial_interval(Duration::from_millis(500));
///
/// assert!(policy.has_attempts_remaining(3));
/// assert!(!policy.has_attempts_remaining(4));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(with = "millis")]
    pub initial_interval: Duration,

    /// Upper bound on the delay between attempts
    #[serde(with = "millis")]
    pub max_interval: Duration,

    pub backoff_coefficient: f64,

    /// Jitter factor (0.0-1.0); 0.1 means +/-10%
    pub jitter: f64,

    /// Error types that fail the activity immediately
    #[serde(default)]
    pub non_retryable_errors: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryPolicy {
    fn constant(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_interval: interval,
            max_interval: interval,
            backoff_coefficient: 1.0,
            jitter: 0.0,
            non_retryable_errors: Vec::new(),
        }
    }

    /// 5 attempts, 1s doubling up to 60s, 10% jitter
    pub fn exponential() -> Self {
        Self {
            max_interval: Duration::from_secs(60),
            backoff_coefficient: 2.0,
            jitter: 0.1,
            ..Self::constant(5, Duration::from_secs(1))
        }
    }

    /// A single attempt; any failure is final
    pub fn no_retry() -> Self {
        Self::constant(1, Duration::ZERO)
    }

    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self::constant(max_attempts, interval)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_non_retryable_error(mut self, error_type: impl Into<String>) -> Self {
        self.non_retryable_errors.push(error_type.into());
        self
    }

    /// Delay before `attempt` (1-based) may be claimed
    ///
    /// The first attempt never waits. Retry `n` waits
    /// `initial_interval * coefficient^(n-1)`, capped at `max_interval` and
    /// then spread by the jitter factor.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(retry) = attempt.checked_sub(2) else {
            return Duration::ZERO;
        };

        let growth = self.backoff_coefficient.powi(retry.min(64) as i32);
        let delay = self
            .initial_interval
            .mul_f64(growth.min(f64::from(u32::MAX)))
            .min(self.max_interval);

        if self.jitter == 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        delay.mul_f64(spread)
    }

    /// Whether `error` after `attempt` should be retried
    pub fn should_retry(&self, attempt: u32, error: &ActivityError) -> bool {
        let excluded = error
            .error_type
            .as_ref()
            .is_some_and(|t| self.non_retryable_errors.contains(t));
        error.retryable && !excluded && self.has_attempts_remaining(attempt)
    }

    pub fn has_attempts_remaining(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_single_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.should_retry(1, &ActivityError::retryable("boom")));
    }

    #[test]
    fn test_fixed_interval() {
        let policy = RetryPolicy::fixed(Duration::from_secs(5), 3);

        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_for_attempt() {
        let policy = RetryPolicy::exponential().with_jitter(0.0);

        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(4));
    }

    #[test]
    fn test_max_interval_cap() {
        let policy = RetryPolicy::exponential()
            .with_max_interval(Duration::from_secs(5))
            .with_jitter(0.0);

        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::fixed(Duration::from_secs(10), 5).with_jitter(0.2);

        for _ in 0..50 {
            let delay = policy.delay_for_attempt(2);
            assert!(delay >= Duration::from_secs(8));
            assert!(delay <= Duration::from_secs(12));
        }
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::exponential()
            .with_max_attempts(3)
            .with_non_retryable_error("INVALID_INPUT");

        assert!(policy.should_retry(1, &ActivityError::retryable("flaky")));
        assert!(policy.should_retry(2, &ActivityError::retryable("flaky")));
        assert!(!policy.should_retry(3, &ActivityError::retryable("flaky")));
        assert!(!policy.should_retry(1, &ActivityError::non_retryable("bad")));
        assert!(!policy.should_retry(
            1,
            &ActivityError::retryable("bad").with_type("INVALID_INPUT")
        ));
    }

    #[test]
    fn test_intervals_serialize_as_millis() {
        let value = serde_json::to_value(RetryPolicy::exponential()).unwrap();

        assert_eq!(value["initial_interval"], 1_000);
        assert_eq!(value["max_interval"], 60_000);
        assert_eq!(value["non_retryable_errors"], serde_json::json!([]));
    }
}
