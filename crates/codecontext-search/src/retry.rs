//! Retry with exponential backoff, jitter and per-call timeouts.
//!
//! Embedding and storage calls share one policy: each attempt runs under a
//! deadline, transient failures back off exponentially (base 2s, cap 30s)
//! with multiplicative jitter, and the final failure surfaces as the last
//! error or a [`SearchError::Timeout`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Result, SearchError};

/// Backoff and deadline policy for one class of calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts beyond the first.
    pub max_retries: u32,
    /// First backoff delay.
    pub base_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Per-attempt deadline.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy for embedding calls (30 s deadline).
    pub fn embedding(max_retries: u32, timeout_secs: u64) -> Self {
        Self {
            max_retries,
            timeout: Duration::from_secs(timeout_secs),
            ..Self::default()
        }
    }

    /// Policy for vector store calls (10 s deadline).
    pub fn storage(max_retries: u32, timeout_secs: u64) -> Self {
        Self {
            max_retries,
            timeout: Duration::from_secs(timeout_secs),
            ..Self::default()
        }
    }

    /// Backoff before attempt `attempt` (1-based), jittered in [0.5, 1.5).
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        exp.mul_f64(jitter)
    }
}

/// Run `operation` under the policy until it succeeds, exhausts retries or
/// hits a non-retryable error.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_retries + 1;
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            let delay = policy.backoff(attempt - 1);
            debug!(
                operation = operation_name,
                attempt, delay_ms = delay.as_millis() as u64,
                "retrying after backoff"
            );
            tokio::time::sleep(delay).await;
        }

        match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) => {
                if !error.is_retryable() {
                    return Err(error);
                }
                warn!(operation = operation_name, attempt, %error, "transient failure");
                last_error = Some(error);
            }
            Err(_) => {
                warn!(operation = operation_name, attempt, "attempt timed out");
                last_error = Some(SearchError::Timeout {
                    operation: operation_name.to_string(),
                    attempts: attempt,
                });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| SearchError::Timeout {
        operation: operation_name.to_string(),
        attempts,
    }))
}
