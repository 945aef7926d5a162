//! HTTP text fetching with exponential backoff retry logic.
//!
//! The open data API rate-limits anonymous callers and its upstream
//! occasionally returns 5xx during maintenance windows, so requests that can
//! be retried are, and requests that can't (4xx other than 429) fail fast.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`FetchText`]: Core trait defining an async text-over-HTTP fetch
//! - [`HttpFetcher`]: Wraps a `reqwest::Client` with optional extra headers
//! - [`RetryFetch`]: Decorator that adds retry logic to any `FetchText` implementation
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use rand::{rng, Rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// An HTTP fetch that did not produce a usable body.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure: DNS, connect, timeout, TLS, or a broken body.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport failures and server-side statuses (429, 5xx) are worth
    /// retrying. Client errors like 404 or 403 will not get better on their
    /// own, and builder errors are bugs.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request(e) => !e.is_builder(),
            FetchError::HttpStatus(code) => *code == 429 || *code >= 500,
        }
    }
}

/// Trait for fetching a text body over HTTP.
///
/// Implementors take a URL and return the response body as text. The
/// abstraction exists so decorators (like retry logic) and test doubles can
/// stand in for a real client.
pub trait FetchText {
    /// Fetch `url` and return the response body.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request fails at the transport level
    /// or the server answers with a non-success status.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// A [`FetchText`] implementation backed by a shared `reqwest::Client`.
///
/// Extra request headers (such as the open data app token) can be attached
/// with [`HttpFetcher::with_header`]. Cloning is cheap: the client is
/// borrowed and only the header list is copied.
#[derive(Clone)]
pub struct HttpFetcher<'a> {
    client: &'a reqwest::Client,
    headers: Vec<(String, String)>,
}

impl<'a> HttpFetcher<'a> {
    /// Create a fetcher that sends requests through `client` with no extra
    /// headers.
    pub fn new(client: &'a reqwest::Client) -> Self {
        HttpFetcher {
            client,
            headers: Vec::new(),
        }
    }

    /// Attach a header to every request this fetcher sends.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

impl fmt::Debug for HttpFetcher<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Header values can carry credentials; log names only.
        let names: Vec<&str> = self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("HttpFetcher")
            .field("headers", &names)
            .finish()
    }
}

impl FetchText for HttpFetcher<'_> {
    #[instrument(level = "info", skip_all, fields(url = %url))]
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let mut request = self.client.get(url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let res: Result<String, FetchError> = async {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }
            Ok(response.text().await?)
        }
        .await;

        let dt = t0.elapsed();
        if let Err(e) = &res {
            warn!(elapsed_ms = dt.as_millis() as u128, error = %e, "HTTP fetch failed");
        }
        res
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchText`]
/// implementation.
///
/// Only errors classified retryable by [`FetchError::is_retryable`] are
/// retried; anything else is returned to the caller immediately.
///
/// # Backoff Strategy
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    /// The underlying fetcher to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: FetchText,
{
    /// Create a new retry wrapper around an existing [`FetchText`]
    /// implementation.
    ///
    /// # Arguments
    ///
    /// * `inner` - The underlying fetcher to wrap
    /// * `max_retries` - Maximum number of retry attempts (5 recommended)
    /// * `base_delay` - Initial delay between retries (1 second recommended)
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchText for RetryFetch<T>
where
    T: FetchText + fmt::Debug,
{
    #[instrument(level = "info", skip_all, fields(url = %url))]
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.fetch_text(url).await {
                Ok(body) => {
                    return Ok(body);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_retryable() {
                        error!(
                            attempt,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "fetch_text() failed with non-retryable error"
                        );
                        return Err(e);
                    }

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "fetch_text() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let exp = (attempt - 1).min(16) as u32;
                    let mut delay = self.base_delay.saturating_mul(1 << exp);
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        ?delay,
                        error = %e,
                        "fetch_text() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// High-level function to fetch a URL with exponential backoff retry logic.
///
/// This is the entry point the open data connector uses for its paged
/// requests.
///
/// # Retry Behavior
///
/// - Up to 5 retry attempts
/// - Exponential backoff: 1s, 2s, 4s, 8s, 16s (capped at 30s)
/// - Random jitter added to prevent thundering herd
#[instrument(level = "info", skip_all, fields(url = %url))]
pub async fn fetch_text_with_backoff<T>(fetcher: T, url: &str) -> Result<String, FetchError>
where
    T: FetchText + fmt::Debug,
{
    let t0 = Instant::now();
    let api = RetryFetch::new(fetcher, 5, StdDuration::from_secs(1));
    let res = api.fetch_text(url).await;
    let dt = t0.elapsed();

    match &res {
        Ok(body) => info!(
            elapsed_ms_total = dt.as_millis() as u128,
            bytes = body.len(),
            "fetch_text_with_backoff succeeded"
        ),
        Err(e) => {
            error!(elapsed_ms_total = dt.as_millis() as u128, error = %e, "fetch_text_with_backoff failed")
        }
    }
    res
}
