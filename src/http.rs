// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! HTTP plumbing: a minimal GET transport, bearer-token injection and a
//! retrying client that honours GitHub style rate-limit headers
//!
//! The layers compose as decorators over the [`Transport`] trait:
//! `RetryingClient` → `BearerAuth` → `AttoTransport`.

use std::cell::Cell;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

pub const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATELIMIT_RESET: &str = "x-ratelimit-reset";
pub const RETRY_AFTER: &str = "retry-after";
pub const AUTHORIZATION: &str = "authorization";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const USER_AGENT: &str = concat!("kbm/", env!("CARGO_PKG_VERSION"));

/// Errors raised below the application layer
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] attohttpc::Error),

    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    #[error("giving up on {url} after {attempts} attempt(s), last status {status}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        status: u16,
    },

    /// Connection level failure reported by a non-attohttpc transport
    #[error("connection failed: {0}")]
    Connection(String),
}

impl TransportError {
    /// Whether a fresh attempt could plausibly succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Connection(_))
    }
}

/// An outgoing GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    headers: Vec<(String, String)>,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Add a header, builder style
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set a header, replacing any previous value (names are case-insensitive)
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        self.headers.retain(|(existing, _)| *existing != name);
        self.headers.push((name, value.into()));
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A fully read response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossily decoded
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Whether the rate-limit budget is reported as spent
    #[must_use]
    pub fn rate_limit_exhausted(&self) -> bool {
        self.header(RATELIMIT_REMAINING).map(str::trim) == Some("0")
    }
}

/// Raw GET primitive
pub trait Transport {
    /// Perform a single request and read the whole body
    ///
    /// # Errors
    /// Returns a `TransportError` when no response could be obtained
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).get(request)
    }
}

/// Blocking transport backed by attohttpc
#[derive(Debug, Clone)]
pub struct AttoTransport {
    timeout: Duration,
}

impl AttoTransport {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for AttoTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for AttoTransport {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = attohttpc::get(&request.url)
            .timeout(self.timeout)
            .header(attohttpc::header::USER_AGENT, USER_AGENT);

        for (name, value) in request.headers() {
            let header_name = attohttpc::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
            let header_value = attohttpc::header::HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
            builder = builder.header(header_name, header_value);
        }

        let resp = builder.send()?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp.bytes()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Adds `Authorization: Bearer <token>` to requests that carry no credentials
pub struct BearerAuth<T> {
    token: Option<String>,
    next: T,
}

impl<T: Transport> BearerAuth<T> {
    /// Wrap `next`; an empty token is treated as no token
    pub fn new(token: Option<String>, next: T) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            next,
        }
    }
}

impl<T: Transport> Transport for BearerAuth<T> {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        match &self.token {
            Some(token) if request.header(AUTHORIZATION).is_none() => {
                debug!("adding Authorization header to request");
                let authorized = request
                    .clone()
                    .with_header(AUTHORIZATION, format!("Bearer {token}"));
                self.next.get(&authorized)
            }
            _ => self.next.get(request),
        }
    }
}

/// Retry and backoff settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Delay is randomized by ±(factor × delay); 0 disables jitter
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// How long to wait before retry number `attempt` (0-based)
    ///
    /// A spent rate-limit budget with a reset time in the future wins over
    /// everything else, then a `Retry-After` header on 429/503, then
    /// exponential backoff with jitter.
    #[must_use]
    pub fn backoff(&self, attempt: u32, response: Option<&HttpResponse>) -> Duration {
        if let Some(resp) = response {
            if let Some(delay) = rate_limit_delay(resp, Utc::now().timestamp()) {
                warn!(
                    seconds = delay.as_secs(),
                    "rate limit exceeded, sleeping until reset"
                );
                return delay;
            }
            if let Some(delay) = retry_after_delay(resp) {
                return delay;
            }
        }
        self.jittered(exponential_backoff(self.min_delay, self.max_delay, attempt))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = delay.as_secs_f64() * self.jitter_factor;
        let unit = f64::from(random_u32()) / f64::from(u32::MAX);
        Duration::from_secs_f64((delay.as_secs_f64() - spread + 2.0 * spread * unit).max(0.0))
    }
}

/// `min × 2^attempt`, capped at `max`
#[must_use]
pub fn exponential_backoff(min: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(31));
    min.checked_mul(factor).map_or(max, |d| d.min(max))
}

/// Time left until the rate-limit reset, if the budget is spent
///
/// `now` is a Unix timestamp in seconds. Returns `None` when the budget is
/// not spent, the reset header is missing or malformed, or the reset time
/// has already passed.
#[must_use]
pub fn rate_limit_delay(response: &HttpResponse, now: i64) -> Option<Duration> {
    if !response.rate_limit_exhausted() {
        return None;
    }
    let reset = response.header(RATELIMIT_RESET)?.trim().parse::<i64>().ok()?;
    let wait = reset.checked_sub(now)?;
    u64::try_from(wait)
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

/// Server supplied `Retry-After` seconds on 429 and 503 responses
fn retry_after_delay(response: &HttpResponse) -> Option<Duration> {
    if response.status != 429 && response.status != 503 {
        return None;
    }
    response
        .header(RETRY_AFTER)?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Whether a response warrants another attempt
///
/// Server errors (except 501) are transient. 403 and 429 are only retried
/// when the rate-limit budget is reported as spent; without that header
/// they usually mean missing permissions.
#[must_use]
pub fn should_retry_response(response: &HttpResponse) -> bool {
    match response.status {
        403 | 429 => response.rate_limit_exhausted(),
        501 => false,
        500..=599 => true,
        _ => false,
    }
}

/// Whether an attempt's outcome warrants another attempt
#[must_use]
pub fn should_retry(outcome: &Result<HttpResponse, TransportError>) -> bool {
    match outcome {
        Ok(response) => should_retry_response(response),
        Err(err) => err.is_transient(),
    }
}

/// GET client with bounded retries
pub struct RetryingClient {
    transport: Box<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(transport: Box<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// attohttpc transport with optional bearer authentication
    #[must_use]
    pub fn with_defaults(token: Option<String>, timeout: Duration, policy: RetryPolicy) -> Self {
        let transport = BearerAuth::new(token, AttoTransport::new(timeout));
        Self::new(Box::new(transport), policy)
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `url`, retrying transient failures
    ///
    /// # Errors
    /// Returns the last transport error once retries are exhausted, or
    /// `TransportError::RetriesExhausted` when the last attempt produced a
    /// retryable response.
    pub fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.send(&HttpRequest::get(url))
    }

    /// Send a prepared request, retrying transient failures
    ///
    /// # Errors
    /// See [`RetryingClient::get`]
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = self.transport.get(request);
            if !should_retry(&outcome) {
                return outcome;
            }

            if attempt >= self.policy.max_retries {
                return match outcome {
                    Ok(response) => Err(TransportError::RetriesExhausted {
                        url: request.url.clone(),
                        attempts: attempt + 1,
                        status: response.status,
                    }),
                    Err(err) => Err(err),
                };
            }

            let delay = self.policy.backoff(attempt, outcome.as_ref().ok());
            match &outcome {
                Ok(response) => debug!(
                    url = %request.url,
                    status = response.status,
                    attempt,
                    delay = ?delay,
                    "retrying request"
                ),
                Err(err) => debug!(
                    url = %request.url,
                    error = %err,
                    attempt,
                    delay = ?delay,
                    "retrying request"
                ),
            }
            thread::sleep(delay);
            attempt += 1;
        }
    }
}

/// xorshift32 seeded from the clock, good enough for jitter
fn random_u32() -> u32 {
    thread_local! {
        static STATE: Cell<u32> = Cell::new(
            Utc::now().timestamp_subsec_nanos() | 1
        );
    }

    STATE.with(|state| {
        let mut x = state.get();
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state.set(x);
        x
    })
}
