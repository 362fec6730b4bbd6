//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawlers:
//! - Building the HTTP client with the configured user agent and timeout
//! - Bounded retry of failed GET requests
//! - The fixed pause after every successful fetch
//! - Error classification

use crate::config::HttpConfig;
use crate::{FetchError, FetchResult};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use steam_harvest::config::HttpConfig;
/// use steam_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs GET requests with a bounded number of attempts
///
/// Every failed attempt (transport error, timeout or non-success status) is
/// retried immediately until `max_retries` attempts have been made. A
/// successful fetch is always followed by the configured pause, which is the
/// only throttle applied to the remote service.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: u32,
    pause: Duration,
}

impl Fetcher {
    pub fn new(client: Client, max_retries: u32, pause: Duration) -> Self {
        Self {
            client,
            max_retries: max_retries.max(1),
            pause,
        }
    }

    /// Builds a fetcher with its own client from the shared HTTP settings
    pub fn from_config(config: &HttpConfig, max_retries: u32) -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            build_http_client(config)?,
            max_retries,
            config.pause(),
        ))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Pause applied after every successful fetch
    pub fn pause(&self) -> Duration {
        self.pause
    }

    /// Fetches `url`, retrying failed attempts
    ///
    /// # Returns
    ///
    /// * `Ok(body)` - The complete response body
    /// * `Err(FetchError::RetriesExhausted)` - Every attempt failed; no
    ///   further request is made for this call
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.attempt(url).await {
                Ok(body) => {
                    tokio::time::sleep(self.pause).await;
                    return Ok(body);
                }
                Err(e) if attempts >= self.max_retries => {
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempts,
                        self.max_retries,
                        url,
                        e
                    );
                }
            }
        }
    }

    /// Issues a single GET request
    async fn attempt(&self, url: &Url) -> FetchResult {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| classify_error(url, e))?;
        Ok(body.to_vec())
    }
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Connection {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
