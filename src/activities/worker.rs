use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{error, warn};

use super::retry::ActivityOptions;
use crate::error::ActivityError;

/// Bounded pool shared by every instance on this host. Each attempt holds
/// one slot for its duration; backoff sleeps hold none.
#[derive(Clone)]
pub struct ActivityWorker {
    slots: Arc<Semaphore>,
}

impl ActivityWorker {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Stops handing out slots. Pending and future executions fail with `PoolClosed`.
    pub fn close(&self) {
        self.slots.close();
    }

    /// Runs `attempt_fn` until it succeeds, fails permanently, or the retry
    /// policy is exhausted. `attempt_fn` receives the 1-based attempt number.
    ///
    /// Each attempt is bounded by the start-to-close timeout. Running out of
    /// attempts on a retryable failure yields [`ActivityError::Exhausted`].
    pub async fn execute<T, F, Fut>(
        &self,
        activity: &'static str,
        options: &ActivityOptions,
        mut attempt_fn: F,
    ) -> Result<T, ActivityError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ActivityError>>,
    {
        let policy = &options.retry;
        let mut attempt = 1;
        loop {
            let result = {
                let _permit = self
                    .slots
                    .acquire()
                    .await
                    .map_err(|_| ActivityError::PoolClosed)?;
                match timeout(options.start_to_close_timeout, attempt_fn(attempt)).await {
                    Ok(result) => result,
                    Err(_) => Err(ActivityError::TimedOut(options.start_to_close_timeout)),
                }
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                error!(activity, attempt, error = %err, "activity failed permanently");
                return Err(err);
            }
            if attempt >= policy.max_attempts {
                error!(activity, attempt, error = %err, "activity retries exhausted");
                return Err(ActivityError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            // A server-supplied retry-after is a floor on the backoff.
            let delay = policy
                .delay_for_attempt(attempt)
                .max(err.retry_after().unwrap_or_default());
            warn!(
                activity,
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "activity attempt failed, retrying"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::RetryPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn options(max_attempts: u32) -> ActivityOptions {
        ActivityOptions {
            start_to_close_timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_attempts,
                initial_interval: Duration::from_secs(2),
                backoff_coefficient: 2.0,
                maximum_interval: Duration::from_secs(60),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let worker = ActivityWorker::new(2);
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let value = worker
            .execute("test", &options(3), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(ActivityError::Transient("rate limited".into()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s + 4s of backoff.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn configuration_error_is_not_retried() {
        let worker = ActivityWorker::new(1);
        let calls = AtomicU32::new(0);

        let err = worker
            .execute("test", &options(3), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ActivityError::Configuration("missing key".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ActivityError::Configuration(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_wraps_last_error() {
        let worker = ActivityWorker::new(1);

        let err = worker
            .execute("test", &options(3), |_| async {
                Err::<(), _>(ActivityError::Transient("empty response".into()))
            })
            .await
            .unwrap_err();

        match err {
            ActivityError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ActivityError::Transient(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out_and_retries() {
        let worker = ActivityWorker::new(1);

        let value = worker
            .execute("test", &options(2), |attempt| async move {
                if attempt == 1 {
                    sleep(Duration::from_secs(60)).await;
                }
                Ok::<_, ActivityError>(attempt)
            })
            .await
            .unwrap();

        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_attempt_waits_at_least_retry_after() {
        let worker = ActivityWorker::new(1);
        let started = tokio::time::Instant::now();

        let value = worker
            .execute("test", &options(2), |attempt| async move {
                if attempt == 1 {
                    Err(ActivityError::Throttled {
                        retry_after: Duration::from_secs(30),
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 2);
        // Policy backoff alone would be 2s.
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn closed_pool_refuses_work() {
        let worker = ActivityWorker::new(1);
        worker.close();
        let err = worker
            .execute("test", &options(1), |_| async { Ok::<_, ActivityError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::PoolClosed));
    }

    #[tokio::test]
    async fn permit_is_released_after_attempt() {
        let worker = ActivityWorker::new(1);
        worker
            .execute("test", &options(1), |_| async { Ok::<_, ActivityError>(()) })
            .await
            .unwrap();
        assert_eq!(worker.available(), 1);
    }
}
