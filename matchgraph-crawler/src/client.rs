use crate::error::FetchError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_RATE_LIMIT_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_AFTER_SECS: f64 = 1.5;

/// HTTP fetch layer with a global in-flight ceiling and server-directed
/// rate-limit backoff.
///
/// A 429 response suspends only the calling request for the advertised
/// `Retry-After` interval and then re-issues it; every other non-success
/// status is returned to the caller untouched. The concurrency permit is
/// held across those waits, so a rate-limited request keeps its slot
/// rather than letting another request take its place.
pub struct RateLimitedClient {
    http: Client,
    api_key: String,
    limiter: Arc<Semaphore>,
    rate_limit_attempts: u32,
}

impl RateLimitedClient {
    pub fn new(api_key: impl Into<String>, concurrency: usize) -> Result<Self, FetchError> {
        Self::with_timeout(api_key, concurrency, 10)
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        concurrency: usize,
        timeout_secs: u64,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("matchgraph/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            limiter: Arc::new(Semaphore::new(concurrency.max(1))),
            rate_limit_attempts: DEFAULT_RATE_LIMIT_ATTEMPTS,
        })
    }

    pub fn with_rate_limit_attempts(mut self, attempts: u32) -> Self {
        self.rate_limit_attempts = attempts.max(1);
        self
    }

    /// Issue one logical GET, resolving 429s internally by honoring
    /// `Retry-After` (default 1.5s when absent or unparseable).
    pub async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .expect("request limiter is never closed");

        let mut rate_limit_hits = 0;
        loop {
            let response = self
                .http
                .get(url)
                .header("X-Riot-Token", &self.api_key)
                .send()
                .await?;

            match response.status() {
                status if status.is_success() => {
                    let body = response.text().await?;
                    return serde_json::from_str(&body)
                        .map_err(|e| FetchError::Decode(e.to_string()));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    rate_limit_hits += 1;
                    if rate_limit_hits >= self.rate_limit_attempts {
                        warn!("Rate limit backoff exhausted for {}", url);
                        return Err(FetchError::HttpStatus(429));
                    }
                    let delay = retry_after_seconds(response.headers());
                    debug!("Rate limited, waiting {:.1}s before re-issuing {}", delay, url);
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
                status => return Err(FetchError::HttpStatus(status.as_u16())),
            }
        }
    }
}

fn retry_after_seconds(headers: &HeaderMap) -> f64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|secs| *secs >= 0.0)
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
