use crate::cancel::{sleep_with_cancel, CancellationState};
use crate::types::RetryConfig;
use crate::{Result, SyncError};
use std::future::Future;
use std::time::Duration;

/// Result of a retry operation with context
#[derive(Debug)]
pub struct RetryResult<T> {
    /// The successful result
    pub result: T,
    /// Number of retry attempts made
    pub attempts_made: u32,
    /// Total time spent waiting between attempts (in seconds)
    pub total_retry_time: u64,
}

/// Delay before retry number `retries` (0-based) given the server's hint.
pub fn backoff_delay(config: &RetryConfig, retry_after: u64, retries: u32) -> u64 {
    let base_backoff = config
        .base_delay
        .saturating_mul(2_u64.saturating_pow(retries));
    std::cmp::min(retry_after.saturating_add(base_backoff), config.max_delay)
}

/// Execute an async operation with retry logic for rate limiting
///
/// Only [`SyncError::RateLimit`] is retried; every other error is returned
/// immediately. Waits between attempts are cancellable, so an interrupt
/// during backoff surfaces as [`SyncError::Interrupted`].
///
/// # Arguments
/// * `config` - Retry configuration
/// * `cancel` - Cancellation state observed while waiting
/// * `operation_name` - Name of the operation for logging
/// * `operation` - Async function that returns a Result
/// * `on_rate_limit` - Callback for rate limit events (delay in seconds)
pub async fn retry_with_backoff<T, F, Fut, OnRateLimit>(
    config: &RetryConfig,
    cancel: &CancellationState,
    operation_name: &str,
    mut operation: F,
    mut on_rate_limit: OnRateLimit,
) -> Result<RetryResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    OnRateLimit: FnMut(u64, &str),
{
    let mut retries = 0;
    let mut total_retry_time = 0;

    loop {
        match operation().await {
            Ok(result) => {
                return Ok(RetryResult {
                    result,
                    attempts_made: retries,
                    total_retry_time,
                });
            }
            Err(SyncError::RateLimit { retry_after }) => {
                if !config.enabled || retries >= config.max_retries {
                    log::warn!(
                        "Max retries ({}) exceeded for {} operation",
                        config.max_retries,
                        operation_name
                    );
                    return Err(SyncError::RateLimit { retry_after });
                }

                let delay = backoff_delay(config, retry_after, retries);

                log::info!(
                    "{} rate limited. Waiting {} seconds before retry {} of {}",
                    operation_name,
                    delay,
                    retries + 1,
                    config.max_retries
                );

                on_rate_limit(delay, operation_name);

                sleep_with_cancel(cancel.subscribe(), Duration::from_secs(delay)).await?;
                retries += 1;
                total_retry_time += delay;
            }
            Err(other_error) => {
                return Err(other_error);
            }
        }
    }
}

/// Simplified retry function for operations that don't need custom rate limit handling
pub async fn retry_operation<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationState,
    operation_name: &str,
    operation: F,
) -> Result<RetryResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_backoff(config, cancel, operation_name, operation, |delay, op_name| {
        log::debug!("Rate limited during {op_name}: waiting {delay} seconds");
    })
    .await
}
