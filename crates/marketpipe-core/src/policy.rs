//! Retry, timeout, and backoff policy for pipeline steps.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Backoff strategy between step retry attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Fixed delay between retries.
    Fixed {
        delay: Duration,
    },
    /// Exponential delay: `base * (factor ^ attempt)`, capped at `max`,
    /// with optional +/- 50% jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            factor: 2.0,
            max: Duration::from_secs(3),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Calculate the delay for a given retry attempt (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let seconds = base.as_secs_f64() * scale;
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds);

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Execution policy for one pipeline step: how often to retry, how long to
/// wait between attempts, and how long one attempt may run.
#[derive(Debug, Clone)]
pub struct StepPolicy {
    /// Maximum number of retries; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub timeout: Duration,
}

impl StepPolicy {
    pub fn new(max_retries: u32, backoff: Backoff, timeout: Duration) -> Self {
        Self {
            max_retries,
            backoff,
            timeout,
        }
    }

    /// Fixed-delay policy, the shape most steps use.
    pub fn fixed(max_retries: u32, delay: Duration, timeout: Duration) -> Self {
        Self::new(max_retries, Backoff::Fixed { delay }, timeout)
    }

    /// Single attempt, no retries.
    pub fn no_retry(timeout: Duration) -> Self {
        Self::fixed(0, Duration::ZERO, timeout)
    }
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Why a step ultimately failed under its policy.
#[derive(Debug)]
pub enum StepError<E> {
    /// The final attempt exceeded the step timeout.
    TimedOut { attempts: u32, timeout: Duration },
    /// All attempts failed; carries the last error.
    Exhausted { attempts: u32, last: E },
}

/// Run one pipeline step under its policy: each attempt is bounded by the
/// step timeout, failed attempts are retried after the backoff delay, and a
/// step that exhausts its retries surfaces as a hard failure.
pub async fn run_step<T, E, F, Fut>(
    step: &'static str,
    policy: &StepPolicy,
    mut op: F,
) -> Result<T, StepError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        let failure = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) => AttemptFailure::Inner(error),
            Err(_) => AttemptFailure::TimedOut,
        };

        let attempts = attempt + 1;
        if attempt >= policy.max_retries {
            return Err(match failure {
                AttemptFailure::Inner(last) => StepError::Exhausted { attempts, last },
                AttemptFailure::TimedOut => StepError::TimedOut {
                    attempts,
                    timeout: policy.timeout,
                },
            });
        }

        let delay = policy.backoff.delay(attempt);
        match &failure {
            AttemptFailure::Inner(error) => warn!(
                step,
                attempt = attempts,
                retry_in_ms = delay.as_millis() as u64,
                %error,
                "step attempt failed; retrying"
            ),
            AttemptFailure::TimedOut => warn!(
                step,
                attempt = attempts,
                retry_in_ms = delay.as_millis() as u64,
                timeout_ms = policy.timeout.as_millis() as u64,
                "step attempt timed out; retrying"
            ),
        }
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

enum AttemptFailure<E> {
    Inner(E),
    TimedOut,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(7), Duration::from_millis(100));
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn step_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = StepPolicy::fixed(3, Duration::from_millis(1), Duration::from_secs(1));

        let result = run_step("extract", &policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.expect("third attempt succeeds"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn step_exhausts_retries_and_reports_last_error() {
        let policy = StepPolicy::fixed(2, Duration::from_millis(1), Duration::from_secs(1));

        let result: Result<(), _> =
            run_step("load", &policy, || async { Err("database unreachable") }).await;

        match result.expect_err("must exhaust") {
            StepError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "database unreachable");
            }
            StepError::TimedOut { .. } => panic!("expected exhaustion, not timeout"),
        }
    }

    #[tokio::test]
    async fn step_timeout_counts_as_a_failed_attempt() {
        let policy = StepPolicy::fixed(1, Duration::from_millis(1), Duration::from_millis(20));

        let result: Result<(), &str> = run_step("extract", &policy, || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(
            result.expect_err("must time out"),
            StepError::TimedOut { attempts: 2, .. }
        ));
    }
}
