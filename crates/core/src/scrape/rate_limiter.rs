//! Token bucket rate limiting for outbound scrape calls.
//!
//! Two buckets guard every call: a coarse budget that fails fast when spent,
//! and a fine pace that waits for the next slot.

use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

use super::ScrapeError;
use crate::config::RateLimitConfig;

/// Token bucket holding up to `max_calls` tokens, refilled evenly over `period`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    /// Tokens added per second.
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket. It starts full.
    pub fn new(max_calls: u32, period: Duration) -> Self {
        let capacity = max_calls as f64;
        let period = period.as_secs_f64().max(f64::EPSILON);
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / period,
            last_refill: Instant::now(),
        }
    }

    /// Try to take a token.
    ///
    /// Returns `Err(wait)` with the time until a token is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else if self.refill_rate <= 0.0 {
            Err(Duration::MAX)
        } else {
            let wait_secs = (1.0 - self.tokens) / self.refill_rate;
            Err(Duration::from_secs_f64(wait_secs))
        }
    }

    /// Tokens currently available, after refilling.
    pub fn available(&mut self) -> f64 {
        self.refill();
        self.tokens
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Budget and pace limits for one scraper.
#[derive(Debug)]
pub struct ScrapeRateLimiter {
    budget: TokenBucket,
    pace: TokenBucket,
}

impl ScrapeRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            budget: TokenBucket::new(config.max_calls, Duration::from_secs(config.period_secs)),
            pace: TokenBucket::new(
                config.pace_calls,
                Duration::from_secs(config.pace_period_secs),
            ),
        }
    }

    pub fn from_buckets(budget: TokenBucket, pace: TokenBucket) -> Self {
        Self { budget, pace }
    }

    /// Acquire one call.
    ///
    /// Fails with [`ScrapeError::RateLimitExceeded`] when the budget is spent;
    /// otherwise waits until the pace allows the call.
    pub async fn acquire(&mut self) -> Result<(), ScrapeError> {
        if let Err(wait) = self.budget.try_acquire() {
            return Err(ScrapeError::RateLimitExceeded {
                retry_after_ms: wait.as_millis().min(u64::MAX as u128) as u64,
            });
        }

        while let Err(wait) = self.pace.try_acquire() {
            debug!(wait_ms = wait.as_millis() as u64, "Pacing scrape call");
            sleep(wait).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_bucket_starts_full() {
        let mut bucket = TokenBucket::new(3, Duration::from_secs(300));
        assert!(bucket.available() > 2.99);
        for _ in 0..3 {
            assert!(bucket.try_acquire().is_ok());
        }
        let wait = bucket.try_acquire().unwrap_err();
        // One token every 100s.
        assert!(wait > Duration::from_secs(99));
        assert!(wait <= Duration::from_secs(100));
    }

    #[tokio::test]
    async fn test_token_bucket_refills() {
        let mut bucket = TokenBucket::new(10, Duration::from_millis(100));
        for _ in 0..10 {
            bucket.try_acquire().unwrap();
        }
        assert!(bucket.try_acquire().is_err());

        sleep(Duration::from_millis(50)).await;
        assert!(bucket.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_budget_fails_fast() {
        let mut limiter = ScrapeRateLimiter::from_buckets(
            TokenBucket::new(2, Duration::from_secs(300)),
            TokenBucket::new(100, Duration::from_secs(1)),
        );
        tokio_test::assert_ok!(limiter.acquire().await);
        tokio_test::assert_ok!(limiter.acquire().await);

        match limiter.acquire().await {
            Err(ScrapeError::RateLimitExceeded { retry_after_ms }) => {
                assert!(retry_after_ms > 100_000)
            }
            other => panic!("Expected RateLimitExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pace_waits_instead_of_failing() {
        let mut limiter = ScrapeRateLimiter::from_buckets(
            TokenBucket::new(100, Duration::from_secs(300)),
            TokenBucket::new(1, Duration::from_millis(80)),
        );
        let start = Instant::now();
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_from_config() {
        let mut limiter = ScrapeRateLimiter::new(&RateLimitConfig::default());
        assert!(limiter.budget.available() > 139.0);
        assert!(limiter.pace.available() > 0.99);
    }
}
