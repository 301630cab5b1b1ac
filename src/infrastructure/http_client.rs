//! HTTP client for web crawling with rate limiting and error handling
//!
//! Provides a robust HTTP client specifically designed for web scraping
//! with respect for server resources and proper error handling.

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client, Response,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::config::FetcherConfig;
use super::page_fetcher::FetchError;

/// HTTP client configuration for crawling
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl HttpClientConfig {
    pub fn from_fetcher_config(config: &FetcherConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout_seconds: config.request_timeout_seconds,
            max_requests_per_second: config.max_requests_per_second,
            max_retries: config.max_retries,
            retry_base_delay_ms: config.retry_base_delay_ms,
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from_fetcher_config(&FetcherConfig::default())
    }
}

/// Rate-limited HTTP client shared by all page sessions
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(&config.user_agent).map_err(|e| FetchError::Network {
            url: String::new(),
            message: format!("invalid user agent: {e}"),
        })?;
        headers.insert(USER_AGENT, user_agent);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let rate = NonZeroU32::new(config.max_requests_per_second).ok_or_else(|| FetchError::Network {
            url: String::new(),
            message: "rate limit must be greater than 0".to_string(),
        })?;
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    /// GET `url` and return the body, retrying transient failures
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.with_retry(url, move || async move {
            self.rate_limiter.until_ready().await;
            debug!("Fetching URL: {}", url);
            let response = self.client.get(url).send().await.map_err(|e| network_error(url, &e))?;
            read_body(url, response).await
        })
        .await
    }

    /// POST a JSON body to `endpoint` and return the response body as text.
    ///
    /// `target` is the page the request is about; it is used in errors and logs.
    pub async fn post_json_text(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
        target: &str,
    ) -> Result<String, FetchError> {
        self.with_retry(target, move || async move {
            self.rate_limiter.until_ready().await;
            debug!("Rendering {} via {}", target, endpoint);
            let response = self
                .client
                .post(endpoint)
                .json(body)
                .send()
                .await
                .map_err(|e| network_error(target, &e))?;
            read_body(target, response).await
        })
        .await
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    async fn with_retry<F, Fut>(&self, url: &str, mut attempt_fn: F) -> Result<String, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            match attempt_fn().await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.config.max_retries && is_retryable(&e) => {
                    let delay = backoff_delay(self.config.retry_base_delay_ms, attempt);
                    warn!(
                        "Failed to fetch {} (attempt {}), retrying in {:?}: {}",
                        url,
                        attempt + 1,
                        delay,
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn read_body(url: &str, response: Response) -> Result<String, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    response.text().await.map_err(|e| network_error(url, &e))
}

fn network_error(url: &str, error: &reqwest::Error) -> FetchError {
    FetchError::Network {
        url: url.to_string(),
        message: error.to_string(),
    }
}

/// `base_ms * 2^attempt`, saturating instead of overflowing
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(2_u64.saturating_pow(attempt)))
}

/// Network errors, 429 and 5xx responses are worth another attempt
const fn is_retryable(error: &FetchError) -> bool {
    match error {
        FetchError::Network { .. } => true,
        FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}
