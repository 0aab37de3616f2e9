use futures::stream::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::document::Document;
use crate::config::Config;

/// Errors that can occur while fetching a document.
///
/// A fetch either yields a parsed [`Document`] or one of these; an empty
/// body is never passed off as a successful fetch of an empty document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Network-level error (DNS, connection, TLS, redirect loop, etc.)
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Connect or read timeout elapsed
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err)
        }
    }
}

/// Retrieves remote resources as parsed [`Document`]s.
///
/// Cheap to clone: clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct DocumentFetcher {
    client: reqwest::Client,
    max_document_bytes: usize,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl DocumentFetcher {
    /// Builds a fetcher whose client applies the configured timeouts,
    /// redirect bound and user agent.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.connect_timeout() + config.read_timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_document_bytes: config.max_document_bytes,
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Fetches `url` and parses the body.
    ///
    /// # Behavior
    ///
    /// - Redirects are followed up to the configured limit; the returned
    ///   document carries the final URL
    /// - 429 and 5xx responses are retried with exponential backoff
    /// - Truncated bodies (fewer bytes than Content-Length) are retried the same way
    /// - Other non-2xx responses fail immediately
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] - `url` does not parse
    /// - [`FetchError::Network`] - Connection, TLS or redirect errors
    /// - [`FetchError::Timeout`] - Connect or read timeout elapsed
    /// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
    /// - [`FetchError::RateLimited`] - 429 response after max retries
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded the size limit
    pub async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let target = Url::parse(url)?;
        let mut retry_count = 0;

        loop {
            let response = self.client.get(target.clone()).send().await?;
            let status = response.status();

            // EDGE-004: Handle rate limiting with exponential backoff
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= self.max_retries {
                    return Err(FetchError::RateLimited(self.max_retries));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %target,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if status.is_server_error() {
                if retry_count >= self.max_retries {
                    return Err(FetchError::HttpStatus(status.as_u16()));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %target,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            let final_url = response.url().clone();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_lowercase);

            match read_limited_bytes(response, self.max_document_bytes).await {
                Ok(bytes) => {
                    if final_url != target {
                        tracing::debug!(from = %target, to = %final_url, "Followed redirect");
                    }
                    return Ok(Document::parse(final_url, content_type, &bytes));
                }
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    // EDGE-005: Handle incomplete downloads with retry and exponential backoff
                    if retry_count >= self.max_retries {
                        return Err(FetchError::IncompleteResponse { expected, received });
                    }
                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        url = %target,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
