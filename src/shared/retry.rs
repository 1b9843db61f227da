//! Retry with linear backoff, shared by every gateway call site

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::shared::context::CallContext;
use crate::shared::error::{AppError, AppResult};

/// Backoff policy: attempt `n` (1-based) failing transiently waits `n * base_interval`
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_interval,
        }
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_interval * attempt
    }
}

/// Run `operation` until it succeeds, fails non-retryably, or attempts run out.
///
/// Errors for which `is_retryable` returns false are returned as-is without
/// consuming further attempts. `Cancelled` is never retried. Exhaustion
/// surfaces as `GatewayUnavailable` carrying the last error.
pub async fn retry_with_backoff<T, F, Fut, P>(
    ctx: &CallContext,
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
    is_retryable: P,
) -> AppResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AppResult<T>>,
    P: Fn(&AppError) -> bool,
{
    let mut last_error = None;
    for attempt in 1..=policy.max_attempts {
        match ctx.run(operation(attempt)).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = %operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) => {
                warn!(
                    operation = %operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Transient gateway failure"
                );
                last_error = Some(e);
                if attempt < policy.max_attempts {
                    ctx.sleep(policy.backoff_for(attempt)).await?;
                }
            }
        }
    }

    Err(AppError::GatewayUnavailable {
        attempts: policy.max_attempts,
        last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
    })
}
