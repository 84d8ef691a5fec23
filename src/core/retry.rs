//! Bounded retry with exponential backoff for price fetches
//!
//! Transient fetch failures (rate limit, timeout, 5xx) are retried with
//! exponential backoff plus jitter up to a configured attempt budget.
//! Permanent failures (bad event id, auth) return immediately so one
//! broken event cannot stall the rest of the cycle.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::adapters::errors::FetchResult;
use crate::adapters::traits::PriceFetcher;
use crate::core::types::PriceObservation;

/// Backoff policy for transient fetch failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt
    pub base: Duration,
    /// Ceiling for any single delay
    pub cap: Duration,
    /// Total attempts, including the first
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
            max_attempts: 4,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): base * 2^(n-1),
    /// capped, plus up to 25% jitter to avoid thundering on the API.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let raw = self.base.saturating_mul(1u32 << exp);
        let capped = raw.min(self.cap);

        let jitter_ms = capped.as_millis() as u64 / 4;
        if jitter_ms == 0 {
            return capped;
        }
        capped + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Fetch with bounded retry. Returns the observations, or the last
/// error once the budget is exhausted or a permanent error is seen.
/// `attempts_made` reports how many API calls were spent.
pub async fn fetch_with_retry<F>(
    fetcher: &F,
    event_id: &str,
    policy: &RetryPolicy,
    attempts_made: &mut u32,
) -> FetchResult<Vec<PriceObservation>>
where
    F: PriceFetcher + ?Sized,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        *attempts_made = attempt;

        match fetcher.fetch(event_id).await {
            Ok(observations) => return Ok(observations),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    event_id,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient fetch failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::errors::FetchError;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fetcher that fails `failures` times before succeeding
    struct FlakyFetcher {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> FetchError,
    }

    impl FlakyFetcher {
        fn new(failures: u32, error: fn() -> FetchError) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                error,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceFetcher for FlakyFetcher {
        async fn fetch(&self, event_id: &str) -> FetchResult<Vec<PriceObservation>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err((self.error)());
            }
            Ok(vec![PriceObservation {
                event_id: event_id.to_string(),
                price: Decimal::from(100),
                section: "General".to_string(),
                availability: 1,
                observed_at: Utc::now(),
            }])
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            base: Duration::from_millis(1),
            cap: Duration::from_millis(4),
            max_attempts: 4,
        }
    }

    #[test]
    fn test_delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(8),
            max_attempts: 6,
        };

        // Jitter adds at most 25%, so check bands rather than exact values
        let d1 = policy.delay_after(1);
        assert!(d1 >= Duration::from_secs(1) && d1 < Duration::from_millis(1500));

        let d3 = policy.delay_after(3);
        assert!(d3 >= Duration::from_secs(4) && d3 < Duration::from_secs(6));

        let d6 = policy.delay_after(6);
        assert!(d6 >= Duration::from_secs(8) && d6 <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_rate_limited_three_times_then_success() {
        let fetcher = FlakyFetcher::new(3, || FetchError::RateLimited("quota".to_string()));
        let mut attempts = 0;

        let result = fetch_with_retry(&fetcher, "evt1", &fast_policy(), &mut attempts).await;

        assert!(result.is_ok());
        assert_eq!(attempts, 4);
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test]
    async fn test_budget_exhausted_returns_last_error() {
        let fetcher = FlakyFetcher::new(10, || FetchError::ServerError(503));
        let mut attempts = 0;

        let result = fetch_with_retry(&fetcher, "evt1", &fast_policy(), &mut attempts).await;

        assert!(matches!(result, Err(FetchError::ServerError(503))));
        assert_eq!(attempts, 4);
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test]
    async fn test_permanent_error_skips_retries() {
        let fetcher = FlakyFetcher::new(10, || FetchError::NotFound("evt1".to_string()));
        let mut attempts = 0;

        let result = fetch_with_retry(&fetcher, "evt1", &fast_policy(), &mut attempts).await;

        assert!(matches!(result, Err(FetchError::NotFound(_))));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_immediate_success_makes_one_call() {
        let fetcher = FlakyFetcher::new(0, || FetchError::Timeout);
        let mut attempts = 0;

        let result = fetch_with_retry(&fetcher, "evt1", &fast_policy(), &mut attempts).await;

        assert!(result.is_ok());
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(attempts, 1);
    }
}
