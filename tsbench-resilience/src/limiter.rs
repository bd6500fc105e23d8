//! Token bucket rate limiter keyed on metric count
//!
//! Shared by all workers of a run. Requests larger than the bucket are
//! admitted once the bucket has refilled enough and leave it in debt, so the
//! long-run rate stays at `max_rate` whatever the batch size.

use log::debug;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    fn new(max_tokens: u64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens as f64,
            last_refill: Instant::now(),
            max_tokens: max_tokens as f64,
            refill_rate,
        }
    }

    fn try_consume(&mut self, tokens: f64) -> bool {
        self.refill();

        if self.tokens >= tokens {
            self.tokens -= tokens;
            true
        } else {
            false
        }
    }

    /// Take `tokens` now and return how long the caller must wait before
    /// using them
    fn reserve(&mut self, tokens: f64) -> Duration {
        self.refill();
        self.tokens -= tokens;

        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.refill_rate)
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        let tokens_to_add = elapsed * self.refill_rate;
        self.tokens = (self.tokens + tokens_to_add).min(self.max_tokens);
        self.last_refill = now;
    }
}

/// Token bucket limiter
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// `max_rate` tokens per second with bursts of up to `bucket_size`
    pub fn new(max_rate: f64, bucket_size: u64) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(bucket_size, max_rate)),
        }
    }

    /// Wait until `permits` tokens are available and take them
    pub async fn acquire(&self, permits: u64) {
        let wait = self.bucket.lock().reserve(permits as f64);
        if !wait.is_zero() {
            debug!("Rate limited: waiting {:?} for {} permits", wait, permits);
            tokio::time::sleep(wait).await;
        }
    }

    /// Take `permits` tokens if they are available right now
    pub fn try_acquire(&self, permits: u64) -> bool {
        self.bucket.lock().try_consume(permits as f64)
    }

    /// Tokens currently in the bucket; negative while in debt
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        bucket.refill();
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_immediate() {
        let limiter = RateLimiter::new(100.0, 100);
        let start = Instant::now();
        limiter.acquire(100).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(!limiter.try_acquire(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_refill() {
        let limiter = RateLimiter::new(100.0, 100);
        limiter.acquire(100).await;

        let start = Instant::now();
        limiter.acquire(50).await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(499), "waited {:?}", waited);
        assert!(waited <= Duration::from_millis(501), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_request_leaves_debt() {
        let limiter = RateLimiter::new(1000.0, 100);

        // 300 tokens from a 100-token bucket: 200 tokens of debt, 200ms wait
        let start = Instant::now();
        limiter.acquire(300).await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(199), "waited {:?}", waited);
        assert!(waited <= Duration::from_millis(201), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_rate_across_tasks() {
        let limiter = Arc::new(RateLimiter::new(1000.0, 100));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..5 {
                    limiter.acquire(100).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 2000 tokens at 1000/s with a 100 token head start
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1899), "elapsed {:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(1901), "elapsed {:?}", elapsed);
    }
}
