//! Bounded linear-backoff retry around a single logical request.
//!
//! Retry bookkeeping lives in a [`RetryState`] created per call and dropped
//! when the call settles, so concurrent callers never share a counter.

use crate::constants::{MAX_RETRIES, RETRY_BASE_DELAY};
use crate::error::{CaptionError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: RETRY_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Wait before retry `retry` (1-based): `retry * base_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }
}

#[derive(Debug)]
pub struct RetryState {
    retries: u32,
    max_retries: u32,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            retries: 0,
            max_retries: policy.max_retries,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }

    fn exhausted(&self) -> bool {
        self.retries >= self.max_retries
    }
}

/// Runs `request` until it succeeds, fails with a non-retryable error, or
/// uses up the policy's attempts.
///
/// `request` is called once per attempt and must produce an identical request
/// each time. Non-retryable failures return immediately without backoff;
/// exhaustion yields [`CaptionError::RetriesExhausted`] wrapping the last error.
pub async fn send_with_retry<T, F, Fut>(policy: &RetryPolicy, mut request: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut state = RetryState::new(policy);

    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if state.exhausted() => {
                return Err(CaptionError::RetriesExhausted {
                    attempts: state.attempts(),
                    last: Box::new(err),
                });
            }
            Err(err) => {
                state.retries += 1;
                let delay = policy.delay_for(state.retries);
                warn!(
                    retry = state.retries,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying caption request"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn unavailable() -> CaptionError {
        CaptionError::Server {
            status: 503,
            message: "Service Unavailable".to_string(),
        }
    }

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_503_makes_four_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = send_with_retry(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(CaptionError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last, CaptionError::Server { status: 503, .. }));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let result: Result<()> = send_with_retry(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CaptionError::Client {
                    status: 400,
                    message: "Invalid image".to_string(),
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(CaptionError::Client { status: 400, .. })));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = send_with_retry(&RetryPolicy::default(), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match attempt {
                    0 => Err(CaptionError::Network("connection refused".to_string())),
                    1 => Err(CaptionError::Timeout(Duration::from_secs(60))),
                    _ => Ok("captioned"),
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "captioned");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_n_times_base_delay() {
        let attempt_times = Arc::new(Mutex::new(Vec::new()));
        let times = attempt_times.clone();
        let _: Result<()> = send_with_retry(&RetryPolicy::default(), move || {
            times.lock().unwrap().push(Instant::now());
            async { Err(unavailable()) }
        })
        .await;

        let times = attempt_times.lock().unwrap();
        assert_eq!(times.len(), 4);
        for n in 1..4 {
            let gap = times[n] - times[n - 1];
            assert!(gap >= Duration::from_secs(n as u64), "retry {} waited {:?}", n, gap);
            assert!(gap < Duration::from_secs(n as u64) + Duration::from_millis(50));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_keep_separate_counts() {
        let policy = RetryPolicy::default();
        let failing_calls = AtomicU32::new(0);
        let flaky_calls = AtomicU32::new(0);

        let failing = send_with_retry(&policy, || {
            failing_calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(unavailable()) }
        });
        let flaky = send_with_retry(&policy, || {
            let attempt = flaky_calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(unavailable())
                } else {
                    Ok(attempt)
                }
            }
        });

        let (failing, flaky) = tokio::join!(failing, flaky);

        assert!(matches!(
            failing,
            Err(CaptionError::RetriesExhausted { attempts: 4, .. })
        ));
        assert_eq!(flaky.unwrap(), 1);
        assert_eq!(failing_calls.load(Ordering::SeqCst), 4);
        assert_eq!(flaky_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_policy() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = send_with_retry(&RetryPolicy::new(0, Duration::ZERO), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(CaptionError::RetriesExhausted { attempts: 1, .. })
        ));
    }
}
