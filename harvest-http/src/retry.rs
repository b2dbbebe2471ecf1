//! Explicit retry policy shared by every fallible upstream call.
//!
//! A [`RetryPolicy`] is a plain value (attempt budget plus a capped exponential
//! backoff schedule). [`with_retry`] applies it around any async operation whose
//! error type implements [`Retryable`], so retry behaviour is visible at the call
//! site rather than hidden in wrappers.
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Classifies an error as worth another attempt.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// Attempt budget and backoff schedule.
///
/// ```
/// use harvest_http::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(2), Duration::from_secs(10));
/// assert_eq!(policy.delay_for(1), Duration::from_secs(2));
/// assert_eq!(policy.delay_for(2), Duration::from_secs(4));
/// assert_eq!(policy.delay_for(5), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never below 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Backoff slept after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let factor = 1u32 << exp;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Number of retries after the first attempt.
    pub fn retries(&self) -> u32 {
        self.max_attempts.saturating_sub(1)
    }
}

/// Error returned once the retry budget is spent (or a permanent error shows up).
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last: E,
}

/// Run `op` until it succeeds, fails permanently, or the attempt budget is spent.
///
/// ```
/// # async fn demo() {
/// use harvest_http::{with_retry, RetryPolicy, Retryable};
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// struct Flaky;
/// impl Retryable for Flaky {
///     fn is_transient(&self) -> bool { true }
/// }
/// impl std::fmt::Display for Flaky {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         f.write_str("flaky")
///     }
/// }
///
/// let policy = RetryPolicy::new(2, Duration::ZERO, Duration::ZERO);
/// let out: Result<(), _> = with_retry(&policy, "demo", || async { Err(Flaky) }).await;
/// assert_eq!(out.unwrap_err().attempts, 2);
/// # }
/// ```
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    op: &str,
    mut call: F,
) -> Result<T, RetryExhausted<E>>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match call().await {
            Ok(v) => return Ok(v),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    op,
                    attempt,
                    max_attempts = policy.max_attempts,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "retry.backing_off"
                );
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::warn!(op, attempt, error = %err, "retry.exhausted");
                }
                return Err(RetryExhausted {
                    attempts: attempt,
                    last: err,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum E {
        Transient,
        Permanent,
    }

    impl std::fmt::Display for E {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for E {
        fn is_transient(&self) -> bool {
            matches!(self, E::Transient)
        }
    }

    fn fast(n: u32) -> RetryPolicy {
        RetryPolicy::new(n, Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn delay_is_capped() {
        let p = RetryPolicy::new(10, Duration::from_millis(500), Duration::from_secs(3));
        assert_eq!(p.delay_for(1), Duration::from_millis(500));
        assert_eq!(p.delay_for(3), Duration::from_secs(2));
        assert_eq!(p.delay_for(4), Duration::from_secs(3));
        assert_eq!(p.delay_for(40), Duration::from_secs(3));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out = with_retry(&fast(3), "t", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(E::Transient)
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = with_retry(&fast(5), "t", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(E::Permanent)
        })
        .await
        .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = with_retry(&fast(3), "t", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(E::Transient)
        })
        .await
        .unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.last, E::Transient));
    }
}
