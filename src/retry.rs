//! Exponential backoff with jitter for transient external-call failures.
//!
//! Shaped like the `dashflow::core::retry` module the teacher crate calls
//! into from its HTTP clients (`RetryPolicy::exponential(n)`, a
//! `with_retry(&policy, || async { .. })` combinator) — that module's
//! source was not present in the retrieval pack, so this is a from-scratch
//! implementation of the same contract.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Governs how many times, and with what backoff, a transient failure is
/// retried before being treated as terminal.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    /// Exponential backoff starting at 200ms, capped at 10s, with the given
    /// number of retries after the initial attempt.
    pub fn exponential(max_retries: u32) -> Self {
        Self::exponential_with_params(max_retries, 200, 10_000)
    }

    /// Exponential backoff with explicit base and cap, in milliseconds.
    pub fn exponential_with_params(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// No retries: the first failure is terminal.
    pub fn none() -> Self {
        Self::exponential_with_params(0, 0, 0)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms.saturating_mul(1u64 << attempt.min(20));
        let capped = exp.min(self.max_delay_ms);
        let jitter = rand::thread_rng().gen_range(0..=capped / 4 + 1);
        Duration::from_millis(capped + jitter)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// A classification an operation can attach to its error so `with_retry`
/// knows whether to try again.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Runs `op` up to `policy.max_retries() + 1` times, sleeping with jittered
/// exponential backoff between attempts, and stopping early the first time
/// an error reports itself as non-retryable.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries() || !err.is_retryable() {
                    return Err(err);
                }
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TransientErr(bool);
    impl Retryable for TransientErr {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::exponential_with_params(5, 1, 2);
        let result: Result<u32, TransientErr> = with_retry(&policy, || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(TransientErr(true))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::exponential_with_params(5, 1, 2);
        let result: Result<u32, TransientErr> = with_retry(&policy, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransientErr(false))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_then_fails() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::exponential_with_params(2, 1, 2);
        let result: Result<u32, TransientErr> = with_retry(&policy, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransientErr(true))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3); // initial + 2 retries
    }
}
