//! Retry executor with exponential backoff.
//!
//! Every network call in the crate goes through [`with_retry`]. The executor
//! retries only errors whose [`PodflowError::is_retryable`] is true; callers
//! classify permanent failures by returning any other variant.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::errors::{PodflowError, PodflowResult};
use crate::events::{names, EventSink};

/// Jitter strategy applied on top of the computed backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Exact delays.
    #[default]
    None,
    /// Random from 0 to delay.
    Full,
    /// Half fixed, half random.
    Equal,
}

/// Governs every network operation uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after each failure.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound for any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter: JitterStrategy::None,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay_ms(mut self, delay: u64) -> Self {
        self.initial_delay_ms = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Checks `max_attempts >= 1` and `backoff_multiplier > 1`.
    pub fn validate(&self) -> PodflowResult<()> {
        if self.max_attempts == 0 {
            return Err(PodflowError::invalid_input(
                "retry policy max_attempts must be at least 1",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 1.0 {
            return Err(PodflowError::invalid_input(format!(
                "retry policy backoff_multiplier must be greater than 1 (got {})",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Initial delay as a `Duration`.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Un-jittered delay after the given failed attempt (1-based).
    ///
    /// `initial_delay × backoff_multiplier^(attempt - 1)`, capped at
    /// `max_delay_ms`.
    #[must_use]
    pub fn base_delay_after(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let millis = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_delay_ms as f64).max(0.0).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = capped as u64;
        Duration::from_millis(millis)
    }

    /// Delay after the given failed attempt with jitter applied.
    #[must_use]
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let delay = self.base_delay_after(attempt);
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);

        match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if millis == 0 {
                    delay
                } else {
                    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
                }
            }
            JitterStrategy::Equal => {
                let half = millis / 2;
                if half == 0 {
                    delay
                } else {
                    Duration::from_millis(half + rand::thread_rng().gen_range(0..=half))
                }
            }
        }
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more attempts left.
    GiveUp,
    /// The error is permanent.
    NotRetryable,
}

/// Decides what to do after `attempt` (1-based) failed with `error`.
#[must_use]
pub fn decide(policy: &RetryPolicy, attempt: usize, error: &PodflowError) -> RetryDecision {
    if !error.is_retryable() {
        RetryDecision::NotRetryable
    } else if attempt >= policy.max_attempts {
        RetryDecision::GiveUp
    } else {
        RetryDecision::Retry(policy.delay_after(attempt))
    }
}

/// A successful value and the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    /// The operation's result.
    pub value: T,
    /// Attempt number (1-based) that succeeded.
    pub attempt: usize,
}

/// Executes `operation` until it succeeds, fails permanently, or runs out of
/// attempts.
///
/// Permanent errors are returned unchanged. When the last attempt fails with
/// a retryable error the result is [`PodflowError::ExhaustedRetries`]
/// wrapping that error.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    key: &str,
    sink: &dyn EventSink,
    mut operation: F,
) -> PodflowResult<Attempted<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PodflowResult<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(key, attempt, "succeeded after retry");
                }
                return Ok(Attempted { value, attempt });
            }
            Err(error) => match decide(policy, attempt, &error) {
                RetryDecision::NotRetryable => {
                    tracing::debug!(key, attempt, error = %error, "permanent error, not retrying");
                    return Err(error);
                }
                RetryDecision::Retry(delay) => {
                    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    tracing::warn!(
                        key,
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms,
                        error = %error,
                        "attempt failed, retrying"
                    );
                    sink.try_emit(
                        names::RETRY_ATTEMPT_FAILED,
                        Some(serde_json::json!({
                            "key": key,
                            "attempt": attempt,
                            "error": error.to_string(),
                        })),
                    );
                    sink.try_emit(
                        names::RETRY_SCHEDULED,
                        Some(serde_json::json!({
                            "key": key,
                            "next_attempt": attempt + 1,
                            "delay_ms": delay_ms,
                        })),
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    tracing::error!(key, attempts = attempt, error = %error, "retries exhausted");
                    sink.try_emit(
                        names::RETRY_ATTEMPT_FAILED,
                        Some(serde_json::json!({
                            "key": key,
                            "attempt": attempt,
                            "error": error.to_string(),
                        })),
                    );
                    sink.try_emit(
                        names::RETRY_EXHAUSTED,
                        Some(serde_json::json!({"key": key, "attempts": attempt})),
                    );
                    return Err(PodflowError::ExhaustedRetries {
                        key: key.to_string(),
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CollectingEventSink, NoOpEventSink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(max_attempts)
            .with_initial_delay_ms(1)
            .with_backoff_multiplier(2.0)
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay_ms, 1000);
        assert!((policy.backoff_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(policy.jitter, JitterStrategy::None);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_retry_policy_deserializes_with_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 5}"#).unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay_ms, 1000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let err = RetryPolicy::new().with_max_attempts(0).validate().unwrap_err();
        assert!(matches!(err, PodflowError::InvalidInput(_)));

        let err = RetryPolicy::new()
            .with_backoff_multiplier(1.0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("backoff_multiplier"));

        assert!(RetryPolicy::new()
            .with_backoff_multiplier(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_base_delay_grows_by_multiplier() {
        let policy = RetryPolicy::new()
            .with_initial_delay_ms(100)
            .with_backoff_multiplier(3.0);

        assert_eq!(policy.base_delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.base_delay_after(2), Duration::from_millis(300));
        assert_eq!(policy.base_delay_after(3), Duration::from_millis(900));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::new()
            .with_initial_delay_ms(1000)
            .with_max_delay_ms(5000);

        assert_eq!(policy.base_delay_after(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_full_jitter_stays_within_bounds() {
        let policy = RetryPolicy::new()
            .with_initial_delay_ms(100)
            .with_jitter(JitterStrategy::Full);

        for _ in 0..20 {
            assert!(policy.delay_after(1) <= Duration::from_millis(100));
        }

        let equal = policy.with_jitter(JitterStrategy::Equal);
        for _ in 0..20 {
            let d = equal.delay_after(1);
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(100));
        }
    }

    #[test]
    fn test_decide() {
        let policy = fast_policy(3);
        let transient = PodflowError::transient("reset");

        assert!(matches!(decide(&policy, 1, &transient), RetryDecision::Retry(_)));
        assert!(matches!(decide(&policy, 2, &transient), RetryDecision::Retry(_)));
        assert_eq!(decide(&policy, 3, &transient), RetryDecision::GiveUp);
        assert_eq!(
            decide(&policy, 1, &PodflowError::malformed("x")),
            RetryDecision::NotRetryable
        );
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let mut calls = 0;
        let result = with_retry(&fast_policy(3), "op", &NoOpEventSink, || {
            calls += 1;
            async { Ok::<_, PodflowError>(42) }
        })
        .await
        .unwrap();

        assert_eq!(result, Attempted { value: 42, attempt: 1 });
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_success_after_failures_reports_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = with_retry(&fast_policy(5), "op", &NoOpEventSink, || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(PodflowError::transient(format!("attempt {n}")))
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.value, "done");
        assert_eq!(result.attempt, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_calls_exactly_max_attempts_when_always_failing() {
        for max_attempts in 1..=4 {
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = calls.clone();

            let err = with_retry(&fast_policy(max_attempts), "op", &NoOpEventSink, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(PodflowError::transient("always")) }
            })
            .await
            .unwrap_err();

            assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
            match err {
                PodflowError::ExhaustedRetries { attempts, source, .. } => {
                    assert_eq!(attempts, max_attempts);
                    assert!(source.is_retryable());
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let sink = CollectingEventSink::new();
        let mut calls = 0;

        let err = with_retry(&fast_policy(5), "content", &sink, || {
            calls += 1;
            async { Err::<(), _>(PodflowError::malformed("missing tags")) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls, 1);
        assert!(matches!(err, PodflowError::MalformedContent(_)));
        assert!(sink.events_of_type("retry.").is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_delays_follow_backoff() {
        let sink = CollectingEventSink::new();
        let policy = RetryPolicy::new()
            .with_max_attempts(4)
            .with_initial_delay_ms(5)
            .with_backoff_multiplier(2.0);

        let _ = with_retry(&policy, "op", &sink, || async {
            Err::<(), _>(PodflowError::transient("down"))
        })
        .await;

        let delays: Vec<u64> = sink
            .events_of_type(names::RETRY_SCHEDULED)
            .iter()
            .map(|(_, data)| data.as_ref().unwrap()["delay_ms"].as_u64().unwrap())
            .collect();

        assert_eq!(delays, vec![5, 10, 20]);
        for pair in delays.windows(2) {
            assert_eq!(pair[1], pair[0] * 2);
        }
        assert_eq!(sink.count(names::RETRY_ATTEMPT_FAILED), 4);
        assert_eq!(sink.count(names::RETRY_EXHAUSTED), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_only_the_policy() {
        let policy = fast_policy(3);
        let sink = NoOpEventSink;

        let a = with_retry(&policy, "a", &sink, || async { Ok::<_, PodflowError>(1) });
        let b = with_retry(&policy, "b", &sink, || async {
            Err::<i32, _>(PodflowError::transient("x"))
        });
        let (a, b) = tokio::join!(a, b);

        assert_eq!(a.unwrap().value, 1);
        assert!(matches!(b, Err(PodflowError::ExhaustedRetries { attempts: 3, .. })));
    }
}
