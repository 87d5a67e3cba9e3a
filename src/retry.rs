//! Retry with exponential backoff for store statements.

use crate::error::StoreError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Jitter added to every backoff, in seconds.
const JITTER_SECS: std::ops::Range<f64> = 0.8..1.5;

/// Largest exponent applied to the base delay.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// How often and how patiently a failed statement is re-issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a statement runs at most `retries + 1` times.
    pub retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 4,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self { retries, base_delay }
    }

    /// Fail on the first error.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt + 1`: `base * 2^attempt` plus jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_EXPONENT));
        let jitter = rand::thread_rng().gen_range(JITTER_SECS);
        exponential.saturating_add(Duration::from_secs_f64(jitter))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's retries are spent. The last error is returned unchanged.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, statement: &str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.retries => {
                let delay = policy.backoff(attempt);
                attempt += 1;
                tracing::warn!(
                    attempt,
                    retries = policy.retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    statement = %truncate(statement, 200),
                    "statement failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
