//! Backpressure retry policy and executor
//!
//! A batch the backend pushes back on is resent whole after a fixed sleep,
//! for as long as the backend keeps pushing back. Any other error ends the
//! loop immediately. Resending is at-least-once: a backend that accepted part
//! of a batch before pushing back sees those points again.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::backoff::BackoffSender;
use crate::limiter::RateLimiter;
use crate::shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts; `None` retries until the run is forced
    /// to stop
    pub max_attempts: Option<u32>,

    /// Sleep between attempts
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Retry forever with a fixed delay
    pub fn fixed(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Trait for errors that can be retried
pub trait Retryable {
    /// Whether this error is retryable
    fn is_retryable(&self) -> bool;
}

/// A successful result and the number of attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

impl<T> RetryOutcome<T> {
    /// Number of backoff sleeps before the successful attempt
    pub fn backoffs(&self) -> u32 {
        self.attempts - 1
    }
}

/// Retry executor
///
/// Optionally waits on a shared rate limiter before every attempt, reports
/// backing-off state to a [`BackoffTracker`](crate::BackoffTracker), and
/// gives up once a forced shutdown is requested.
#[derive(Debug, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    limiter: Option<Arc<RateLimiter>>,
    observer: Option<BackoffSender>,
    shutdown: Option<Arc<ShutdownCoordinator>>,
}

impl RetryExecutor {
    /// Create a new retry executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn with_limiter(mut self, limiter: Option<Arc<RateLimiter>>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Report backing-off state to `observer` from now on
    pub fn attach_observer(&mut self, observer: BackoffSender) {
        self.observer = Some(observer);
    }

    /// Stop reporting; required before the tracker can finish
    pub fn detach_observer(&mut self) -> Option<BackoffSender> {
        self.observer.take()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute a function with retry logic
    pub async fn execute<F, Fut, T, E>(&self, permits: u64, mut f: F) -> Result<RetryOutcome<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        self.execute_with_context(permits, |_attempt| f()).await
    }

    /// Execute a function with retry logic and attempt context
    ///
    /// `permits` tokens are taken from the rate limiter before each attempt.
    pub async fn execute_with_context<F, Fut, T, E>(
        &self,
        permits: u64,
        mut f: F,
    ) -> Result<RetryOutcome<T>, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 1;

        loop {
            if let Some(limiter) = &self.limiter {
                limiter.acquire(permits).await;
            }

            debug!("Executing attempt {}", attempt);

            match f(attempt).await {
                Ok(value) => {
                    self.report(false).await;
                    if attempt > 1 {
                        info!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(RetryOutcome { value, attempts: attempt });
                }
                Err(error) if !error.is_retryable() => {
                    self.report(false).await;
                    warn!("Operation failed with non-retryable error: {}", error);
                    return Err(RetryError::NonRetryableError(error));
                }
                Err(error) => {
                    if self.policy.max_attempts.is_some_and(|max| attempt >= max) {
                        self.report(false).await;
                        warn!("Operation failed after {} attempts: {}", attempt, error);
                        return Err(RetryError::MaxAttemptsExceeded {
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    self.report(true).await;
                    debug!(
                        "Attempt {} pushed back: {}. Retrying in {:?}",
                        attempt, error, self.policy.delay
                    );

                    if !self.pause().await {
                        self.report(false).await;
                        warn!("Giving up after {} attempts: shutdown forced", attempt);
                        return Err(RetryError::Cancelled { attempts: attempt });
                    }

                    attempt += 1;
                }
            }
        }
    }

    /// Sleep the policy delay; false when a forced shutdown cut it short
    async fn pause(&self) -> bool {
        match &self.shutdown {
            Some(shutdown) => {
                if shutdown.is_forced() {
                    return false;
                }
                tokio::select! {
                    _ = sleep(self.policy.delay) => true,
                    _ = shutdown.wait_for(ShutdownSignal::Forced) => false,
                }
            }
            None => {
                sleep(self.policy.delay).await;
                true
            }
        }
    }

    async fn report(&self, backing_off: bool) {
        if let Some(observer) = &self.observer {
            observer.send(backing_off).await;
        }
    }
}

/// Retry error types
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts ({attempts}) exceeded. Last error: {last_error}")]
    MaxAttemptsExceeded { attempts: u32, last_error: E },

    /// Non-retryable error encountered
    #[error("Non-retryable error: {0}")]
    NonRetryableError(E),

    /// A forced shutdown interrupted the backoff sleep
    #[error("Cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// Get the underlying error if present
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::MaxAttemptsExceeded { last_error, .. } => Some(last_error),
            RetryError::NonRetryableError(error) => Some(error),
            RetryError::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffTracker;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Backpressure,
        Fatal(String),
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Backpressure => write!(f, "backpressure"),
                TestError::Fatal(message) => write!(f, "{}", message),
            }
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Backpressure)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resends_until_accepted() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let executor = RetryExecutor::new(RetryPolicy::fixed(Duration::from_millis(10)));
        let start = tokio::time::Instant::now();

        let outcome = executor
            .execute(1, || {
                let count = counter_clone.fetch_add(1, Ordering::Relaxed);
                async move {
                    if count < 3 {
                        Err(TestError::Backpressure)
                    } else {
                        Ok("accepted")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome.value, "accepted");
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.backoffs(), 3);
        assert_eq!(counter.load(Ordering::Relaxed), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let executor = RetryExecutor::new(RetryPolicy::fixed(Duration::from_millis(10)));

        let result: Result<RetryOutcome<()>, _> = executor
            .execute(1, || {
                counter_clone.fetch_add(1, Ordering::Relaxed);
                async { Err(TestError::Fatal("status 400".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::NonRetryableError(TestError::Fatal(_)))));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts() {
        let executor = RetryExecutor::new(RetryPolicy::fixed(Duration::from_millis(5)).with_max_attempts(3));

        let result: Result<RetryOutcome<()>, _> = executor
            .execute(1, || async { Err(TestError::Backpressure) })
            .await;

        match result {
            Err(RetryError::MaxAttemptsExceeded { attempts, last_error }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, TestError::Backpressure);
            }
            other => panic!("unexpected result: {:?}", other.map(|o| o.attempts)),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_shutdown_interrupts_backoff() {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let executor = RetryExecutor::new(RetryPolicy::fixed(Duration::from_secs(60)))
            .with_shutdown(shutdown.clone());

        let forcer = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(90)).await;
                shutdown.request(ShutdownSignal::Forced).unwrap();
            })
        };

        let start = tokio::time::Instant::now();
        let result: Result<RetryOutcome<()>, _> = executor
            .execute(1, || async { Err(TestError::Backpressure) })
            .await;
        forcer.await.unwrap();

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 2 })));
        assert_eq!(start.elapsed(), Duration::from_secs(90));
        assert!(result.unwrap_err().into_inner().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_backoff_edges() {
        let tracker = BackoffTracker::spawn(0, None);
        let mut executor = RetryExecutor::new(RetryPolicy::fixed(Duration::from_millis(25)));
        executor.attach_observer(tracker.sender());

        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        executor
            .execute(1, || {
                let count = counter_clone.fetch_add(1, Ordering::Relaxed);
                async move {
                    if count < 2 {
                        Err(TestError::Backpressure)
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        executor.detach_observer();
        let summary = tracker.finish().await;
        assert_eq!(summary.episodes, 1);
        assert_eq!(summary.total, Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiter_applies_to_every_attempt() {
        let limiter = Arc::new(RateLimiter::new(100.0, 100));
        let executor = RetryExecutor::new(RetryPolicy::fixed(Duration::from_millis(1)))
            .with_limiter(Some(limiter.clone()));

        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let start = tokio::time::Instant::now();
        executor
            .execute(100, || {
                let count = counter_clone.fetch_add(1, Ordering::Relaxed);
                async move {
                    if count < 1 {
                        Err(TestError::Backpressure)
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        // Second attempt needs another 100 tokens: one second of refill
        assert!(start.elapsed() >= Duration::from_millis(999));
    }
}
