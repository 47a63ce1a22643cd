//! Explicit retry helper with randomized exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Attempt cap and backoff bounds for one kind of external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            min_delay,
            max_delay,
        }
    }

    /// Policy for per-chunk explanation calls: 3 attempts, 1s..60s.
    #[must_use]
    pub const fn explanation() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Policy for batch embedding calls: 5 attempts, 1s..60s.
    #[must_use]
    pub const fn embedding() -> Self {
        Self::new(5, Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Retries without sleeping between attempts.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Upper bound of the wait after the given zero-based failed attempt:
    /// `min_delay * 2^attempt`, capped at `max_delay`.
    #[must_use]
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.min_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Random wait in `[min_delay, backoff_ceiling(attempt)]`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt);
        let floor = self.min_delay.min(ceiling);
        if ceiling <= floor {
            return floor;
        }
        let lo = u64::try_from(floor.as_millis()).unwrap_or(u64::MAX);
        let hi = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `f` until it succeeds or the policy's attempt cap is reached.
///
/// Sleeps with `tokio::time::sleep` between attempts, so only the calling task
/// waits. Returns the last error once attempts are exhausted.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts();
    let mut attempt = 0u32;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts {
                    tracing::warn!(operation, attempts, "giving up: {e}");
                    return Err(e);
                }
                let delay = policy.delay_for(attempt - 1);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "call failed, retrying: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
