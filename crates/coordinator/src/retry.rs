//! Bounded retry with exponential backoff and jitter
//!
//! Isolated from the state machine so the commit retry policy is
//! unit-testable on its own.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry policy for commit-phase participant calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per call. Zero behaves as one attempt, no retry.
    pub max_retries: u32,

    /// Base delay; attempt `n` waits `base * 2^n` plus jitter
    pub base: Duration,

    /// Upper bound of the uniform jitter added to each delay
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Attempts this policy allows (at least one)
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Delay before the retry following failed attempt `attempt`
    /// (zero-based): `base * 2^attempt + uniform(0..jitter)`
    pub fn delay(&self, attempt: u32) -> Duration {
        // Cap the shift so a pathological attempt count cannot overflow
        let backoff = self.base.saturating_mul(2u32.saturating_pow(attempt.min(16)));

        let jitter_nanos = self.jitter.as_nanos() as u64;
        if jitter_nanos == 0 {
            return backoff;
        }

        let jitter = Duration::from_nanos(rand::thread_rng().gen_range(0..jitter_nanos));
        backoff.saturating_add(jitter)
    }
}

/// Run `op` until it succeeds or the policy is exhausted
///
/// Returns the final result together with the number of attempts made.
pub async fn retry_with_policy<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> (std::result::Result<T, E>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return (Ok(value), attempt + 1),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts {
                    return (Err(e), attempt);
                }
                tokio::time::sleep(policy.delay(attempt - 1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base: Duration::from_millis(1),
            jitter: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = retry_with_policy(&fast_policy(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(42)
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = retry_with_policy(&fast_policy(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("not yet")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let (result, attempts) =
            retry_with_policy(&fast_policy(3), || async { Err::<(), _>("always") }).await;

        assert_eq!(result.unwrap_err(), "always");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_zero_retries_means_one_attempt() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = retry_with_policy(&fast_policy(0), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("nope")
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_grows_exponentially_within_jitter_bound() {
        let policy = RetryPolicy {
            max_retries: 5,
            base: Duration::from_millis(10),
            jitter: Duration::from_millis(5),
        };

        for attempt in 0..4 {
            let expected = Duration::from_millis(10 * 2u64.pow(attempt));
            let delay = policy.delay(attempt);
            assert!(delay >= expected);
            assert!(delay < expected + Duration::from_millis(5));
        }
    }

    #[test]
    fn test_delay_does_not_overflow() {
        let policy = RetryPolicy {
            max_retries: u32::MAX,
            base: Duration::from_secs(u64::MAX / 4),
            jitter: Duration::ZERO,
        };

        // Saturates instead of panicking
        let _ = policy.delay(u32::MAX);
    }
}
