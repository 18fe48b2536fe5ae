use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const TRANSIENT_BACKOFF: Duration = Duration::from_secs(1);

/// Invoke `op` up to `max_attempts` times, sleeping between attempts.
///
/// Only transient failures (transport errors, 5xx) consume attempts; a
/// definitive response such as a 404 is returned immediately. Rate-limit
/// backoff is not handled here, it lives inside `RateLimitedClient`.
pub async fn with_retry<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                warn!(
                    "Transient failure (attempt {}/{}): {}",
                    attempt, max_attempts, err
                );
                tokio::time::sleep(TRANSIENT_BACKOFF).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
