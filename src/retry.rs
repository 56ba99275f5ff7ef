//! Bounded retries for routing requests.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::config::ClientConfig;
use crate::error::ProviderError;

/// Runs `request` until it succeeds, fails permanently, or the attempt
/// budget of `config.retry_limit` is spent.
///
/// `request` receives the 1-based attempt number.
pub fn with_retry<T, F>(config: &ClientConfig, request: F) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Result<T, ProviderError>,
{
    with_retry_sleep(config, request, thread::sleep)
}

fn with_retry_sleep<T, F, S>(config: &ClientConfig, mut request: F, mut sleep: S) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Result<T, ProviderError>,
    S: FnMut(Duration),
{
    let attempts = config.retry_limit.max(1);
    let mut attempt = 1;
    loop {
        match request(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts && err.is_retryable(config.retry_over_rate_limit) => {
                let delay = config.retry_backoff.delay(attempt);
                warn!(attempt, max_attempts = attempts, delay_ms = delay.as_millis() as u64, error = %err, "retrying routing request");
                sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
