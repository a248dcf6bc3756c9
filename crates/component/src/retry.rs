//! Retry policy attached to a component definition.

use std::time::Duration;

use palisade_core::ErrorKind;
use serde::{Deserialize, Serialize};

use crate::serde_duration_secs;

/// How the runtime retries a failing activity.
///
/// The delay before attempt `n` (n ≥ 2) is
/// `min(max_interval, initial_interval * backoff_coefficient^(n-2))`.
/// Kinds listed in `non_retryable_error_kinds` — in addition to the
/// taxonomy's always-fatal kinds — fail on the first attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(with = "serde_duration_secs")]
    pub initial_interval: Duration,
    /// Ceiling applied to every computed delay.
    #[serde(with = "serde_duration_secs")]
    pub max_interval: Duration,
    /// Multiplier applied per additional attempt.
    pub backoff_coefficient: f64,
    /// Extra kinds this component treats as fatal.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_retryable_error_kinds: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
            backoff_coefficient: 2.0,
            non_retryable_error_kinds: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the initial interval.
    #[must_use]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Set the interval ceiling.
    #[must_use]
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient.max(1.0);
        self
    }

    /// Mark additional kinds fatal for this component.
    #[must_use]
    pub fn with_non_retryable(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.non_retryable_error_kinds.extend(kinds);
        self
    }

    /// Returns `true` if a failure of `kind` on attempt `attempt` (1-based)
    /// should be retried under this policy.
    #[must_use]
    pub fn should_retry(&self, kind: ErrorKind, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        kind.is_retryable() && !self.non_retryable_error_kinds.contains(&kind)
    }

    /// Delay to sleep before retrying after a failure on `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_coefficient.max(1.0).powi(exponent as i32);
        let scaled = self.initial_interval.as_secs_f64() * factor;
        Duration::from_secs_f64(scaled).min(self.max_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_interval, Duration::from_secs(1));
        assert_eq!(policy.max_interval, Duration::from_secs(60));
        assert!(policy.non_retryable_error_kinds.is_empty());
    }

    #[test]
    fn exponential_backoff_schedule() {
        let policy = RetryPolicy::default()
            .with_max_attempts(5)
            .with_initial_interval(Duration::from_secs(1))
            .with_backoff_coefficient(2.0);
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
        assert_eq!(policy.delay_after(4), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped_by_max_interval() {
        let policy = RetryPolicy::default()
            .with_initial_interval(Duration::from_secs(10))
            .with_max_interval(Duration::from_secs(15))
            .with_backoff_coefficient(3.0);
        assert_eq!(policy.delay_after(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after(2), Duration::from_secs(15));
        assert_eq!(policy.delay_after(9), Duration::from_secs(15));
    }

    #[test]
    fn retries_stop_at_budget() {
        let policy = RetryPolicy::default().with_max_attempts(3);
        assert!(policy.should_retry(ErrorKind::Network, 1));
        assert!(policy.should_retry(ErrorKind::Network, 2));
        assert!(!policy.should_retry(ErrorKind::Network, 3));
    }

    #[test]
    fn taxonomy_fatal_kinds_never_retry() {
        let policy = RetryPolicy::default().with_max_attempts(10);
        assert!(!policy.should_retry(ErrorKind::Authentication, 1));
        assert!(!policy.should_retry(ErrorKind::Validation, 1));
        assert!(!policy.should_retry(ErrorKind::Cancelled, 1));
    }

    #[test]
    fn component_declared_fatal_kinds_never_retry() {
        let policy = RetryPolicy::default()
            .with_max_attempts(5)
            .with_non_retryable([ErrorKind::RateLimit]);
        assert!(!policy.should_retry(ErrorKind::RateLimit, 1));
        assert!(policy.should_retry(ErrorKind::Network, 1));
    }

    #[test]
    fn none_policy_disables_retries() {
        let policy = RetryPolicy::none();
        assert!(!policy.should_retry(ErrorKind::Network, 1));
    }

    #[test]
    fn max_attempts_floor_is_one() {
        let policy = RetryPolicy::default().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn serde_roundtrip() {
        let policy = RetryPolicy::default()
            .with_max_attempts(4)
            .with_initial_interval(Duration::from_millis(1500))
            .with_non_retryable([ErrorKind::Service]);
        let json = serde_json::to_string(&policy).unwrap();
        let back: RetryPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, back);
    }

    #[test]
    fn serde_intervals_as_seconds() {
        let policy = RetryPolicy::default();
        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["initial_interval"], 1.0);
        assert_eq!(json["max_interval"], 60.0);
    }
}
