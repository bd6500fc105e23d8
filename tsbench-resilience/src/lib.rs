//! Resilience patterns for tsbench
//!
//! This crate provides the fixed-sleep backpressure retry loop, per-worker
//! backoff accounting, a token bucket rate limiter and run-wide shutdown
//! coordination.

pub mod backoff;
pub mod limiter;
pub mod retry;
pub mod shutdown;

// Re-export commonly used types
pub use backoff::{BackoffEvent, BackoffSummary, BackoffGauge, BackoffSender, BackoffTracker, BACKOFF_CHANNEL_CAPACITY};
pub use limiter::RateLimiter;
pub use retry::{RetryError, RetryExecutor, RetryOutcome, RetryPolicy, Retryable};
pub use shutdown::{ShutdownCoordinator, ShutdownError, ShutdownSignal};
