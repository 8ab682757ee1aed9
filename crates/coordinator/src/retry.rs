//! Bounded polling
//!
//! Fixed interval, fixed attempt cap. Bootstrap windows are short, so there
//! is no backoff and no cancellation: a loop runs until it converges, hits a
//! fatal outcome, or exhausts its attempts.

use crate::{Outcome, Pending};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total invocations, not retries
    pub max_attempts: u32,
    /// Pause between two invocations
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Steady-state operations
    pub const fn steady() -> Self {
        Self::new(6, Duration::from_secs(10))
    }

    /// Set creation, which has to outlast the scheduler's cold start
    pub const fn cold_start() -> Self {
        Self::new(20, Duration::from_secs(10))
    }

    /// Drive `op` until it converges or turns fatal, at most `max_attempts` times
    pub async fn run<F, Fut>(&self, operation: &str, mut op: F) -> Outcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let mut last = Outcome::Pending(Pending::Waiting("no attempt made"));

        for attempt in 1..=self.max_attempts {
            let outcome = op().await;
            match &outcome {
                Outcome::Converged => {
                    info!("{} converged after {} attempt(s)", operation, attempt);
                }
                Outcome::Fatal(e) => {
                    error!("{} failed permanently: {}", operation, e);
                }
                Outcome::Pending(reason) => {
                    warn!(
                        "{} not converged (attempt {}/{}): {}",
                        operation, attempt, self.max_attempts, reason
                    );
                }
            }
            if !matches!(outcome, Outcome::Pending(_)) {
                return outcome;
            }
            last = outcome;

            if attempt < self.max_attempts {
                sleep(self.interval).await;
            }
        }

        last
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::steady()
    }
}

/// Boolean form: invoke `op` up to `max_attempts` times, sleeping `interval`
/// between failures. Returns the last observed result.
pub async fn retry<F, Fut>(mut op: F, max_attempts: u32, interval: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut last = false;
    for attempt in 1..=max_attempts {
        last = op().await;
        if last {
            break;
        }
        debug!("Attempt {}/{} failed", attempt, max_attempts);
        if attempt < max_attempts {
            sleep(interval).await;
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoordinatorError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = retry(
            || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    false
                }
            },
            3,
            Duration::from_secs(10),
        )
        .await;

        assert!(!result);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two sleeps between three attempts, none after the last
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_on_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = retry(
            || {
                let calls = calls.clone();
                async move { calls.fetch_add(1, Ordering::SeqCst) + 1 == 2 }
            },
            6,
            Duration::from_secs(10),
        )
        .await;

        assert!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_pending_until_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(4, Duration::from_secs(1));

        let outcome = policy
            .run("test", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Outcome::Pending(Pending::Unreachable)
                }
            })
            .await;

        assert!(matches!(outcome, Outcome::Pending(Pending::Unreachable)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_fatal_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let outcome = RetryPolicy::steady()
            .run("test", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Outcome::Fatal(CoordinatorError::MissingConfig)
                }
            })
            .await;

        assert!(matches!(outcome, Outcome::Fatal(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_converges() {
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = RetryPolicy::cold_start()
            .run("test", || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 5 {
                        Outcome::Pending(Pending::Waiting("not yet"))
                    } else {
                        Outcome::Converged
                    }
                }
            })
            .await;

        assert!(outcome.is_converged());
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_default_policies() {
        assert_eq!(RetryPolicy::default(), RetryPolicy::steady());
        assert_eq!(RetryPolicy::steady().max_attempts, 6);
        assert_eq!(RetryPolicy::cold_start().max_attempts, 20);
    }
}
