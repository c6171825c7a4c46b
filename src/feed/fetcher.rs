use crate::cancel::Cancellation;
use crate::feed::parser::parse_feed;
use crate::feed::types::{FetchFailure, FetchResult, SourceFeed};
use crate::util::validate_feed_url;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

pub const DEFAULT_MAX_TRIES: u32 = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(2);

/// Errors that can occur while fetching a single source feed.
///
/// The last error of a failed fetch is kept as the `cause` of its
/// [`FetchFailure`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source URL was empty or unusable; never retried
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Attempt exceeded the per-request timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// The run was cancelled before the fetch completed
    #[error("Fetch cancelled")]
    Cancelled,
    /// The fetch task panicked or was aborted
    #[error("Fetch task failed: {0}")]
    TaskFailed(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Client errors other than 408/429 fail immediately, as do validation
    /// failures, oversized bodies and cancellation.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_)
            | FetchError::Timeout
            | FetchError::IncompleteResponse { .. }
            | FetchError::Parse(_) => true,
            FetchError::HttpStatus(status) => *status >= 500 || *status == 408 || *status == 429,
            FetchError::InvalidUrl(_)
            | FetchError::ResponseTooLarge
            | FetchError::Cancelled
            | FetchError::TaskFailed(_) => false,
        }
    }
}

/// Per-call fetch settings.
///
/// Passed explicitly to every fetch; nothing about retries is kept in
/// shared state.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum attempts per URL, including the first. Values below 1 act as 1.
    pub max_tries: u32,
    /// Bound on one attempt (request, status and body)
    pub timeout: Duration,
    /// Delay before the second attempt; doubles after every failed attempt
    pub initial_backoff: Duration,
    /// Cap on fetches in flight at once; `None` means one task per URL
    pub max_concurrency: Option<usize>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            timeout: DEFAULT_TIMEOUT,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_concurrency: None,
        }
    }
}

/// Builds the HTTP client shared by every fetch of a run.
pub fn build_client(user_agent: &str) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(user_agent).build()
}

/// Fetches and parses one source feed, retrying transient failures.
///
/// # Behavior
///
/// - Empty or malformed URLs fail immediately with `attempts == 0`
/// - Up to `max_tries` attempts, each bounded by `timeout`
/// - Backoff between attempts: `initial_backoff`, then doubled each time
/// - Non-retryable errors (most 4xx, oversized body) end the loop early
/// - Cancellation is observed before each attempt, during the request and
///   during the backoff sleep; a cancelled fetch never starts another attempt
///
/// Never panics and never returns an error through any channel other than
/// the [`FetchFailure`] side of the result.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    config: &FetchConfig,
    cancel: &Cancellation,
) -> FetchResult {
    let validated = match validate_feed_url(url) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Rejecting invalid feed URL");
            return Err(FetchFailure::new(
                url,
                FetchError::InvalidUrl(e.to_string()),
                0,
            ));
        }
    };

    let max_tries = config.max_tries.max(1);
    let mut delay = config.initial_backoff;
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchFailure::new(url, FetchError::Cancelled, attempt));
        }
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = fetch_attempt(client, validated.as_str(), url, config.timeout) => result,
        };

        let error = match outcome {
            Ok(feed) => {
                tracing::debug!(
                    url = %url,
                    attempt = attempt,
                    items = feed.items.len(),
                    "Fetched feed"
                );
                return Ok(feed);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            tracing::warn!(url = %url, attempt = attempt, error = %error, "Fetch failed");
            return Err(FetchFailure::new(url, error, attempt));
        }

        if attempt >= max_tries {
            tracing::warn!(
                url = %url,
                attempts = attempt,
                error = %error,
                "Fetch failed, retries exhausted"
            );
            return Err(FetchFailure::new(url, error, attempt));
        }

        tracing::warn!(
            url = %url,
            attempt = attempt,
            max_tries = max_tries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Fetch attempt failed, retrying after delay"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(FetchFailure::new(url, FetchError::Cancelled, attempt));
            }
            _ = tokio::time::sleep(delay) => {}
        }
        delay = delay.saturating_mul(2);
    }
}

/// One bounded attempt: request, status check, body read and parse.
async fn fetch_attempt(
    client: &reqwest::Client,
    request_url: &str,
    source_url: &str,
    timeout: Duration,
) -> Result<SourceFeed, FetchError> {
    let bytes = tokio::time::timeout(timeout, async {
        let response = client.get(request_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        read_limited_bytes(response, MAX_FEED_SIZE).await
    })
    .await
    .map_err(|_| FetchError::Timeout)??;

    parse_feed(source_url, &bytes).map_err(|e| FetchError::Parse(e.to_string()))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
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
