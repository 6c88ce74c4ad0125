//! Request execution with retry and backoff.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use crate::error::{is_retryable_status, Error, ErrorKind, Result};
use crate::request::RequestBuilder;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::transport::{HttpResponse, Transport, TransportFailure};

/// Header carrying session cookies on a login response.
const SET_COOKIE: &str = "set-cookie";

/// The final, non-retryable response to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    /// HTTP status code.
    pub status: u16,
    /// Status message.
    pub message: String,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Raw body. Empty when the server sent none.
    pub body: Bytes,
    /// Number of retries it took to get here.
    pub retries: u32,
}

impl RequestOutcome {
    fn from_response(response: HttpResponse, retries: u32) -> Self {
        Self {
            status: response.status,
            message: response.reason,
            headers: response.headers,
            body: response.body,
            retries,
        }
    }

    /// Returns true for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true when there is nothing to parse.
    pub fn is_no_content(&self) -> bool {
        self.status == 204 || self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Session cookies set by the response, as a `Cookie` header value.
    ///
    /// Each `Set-Cookie` contributes its leading `name=value` pair; pairs are
    /// joined with `; `.
    pub fn session_cookie(&self) -> Option<String> {
        let pairs: Vec<&str> = self
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(SET_COOKIE))
            .filter_map(|(_, v)| v.split(';').next())
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

/// Why an attempt did not produce a final outcome.
enum Failure {
    Status { status: u16, reason: String },
    Transport(TransportFailure),
}

impl Failure {
    fn describe(&self) -> String {
        match self {
            Failure::Status { status, reason } => format!("HTTP {} {}", status, reason),
            Failure::Transport(f) => f.message.clone(),
        }
    }

    fn into_error(self, attempts: u32) -> Error {
        match self {
            Failure::Status { status: 429, .. } => Error::new(ErrorKind::RateLimited { attempts }),
            Failure::Status { status, .. } => Error::new(ErrorKind::Server { status, attempts }),
            Failure::Transport(f) => {
                let message = f.message.clone();
                Error::with_source(ErrorKind::Transport { message, attempts }, f)
            }
        }
    }
}

/// Sends requests through a [`Transport`], retrying transient failures.
///
/// Transport failures, HTTP 429 and HTTP 5xx are retried with capped
/// exponential backoff. Every other status is returned as-is for the
/// caller to interpret.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    /// Create an executor over the given transport.
    pub fn new(transport: Arc<dyn Transport>, retry: RetryConfig) -> Self {
        Self { transport, retry }
    }

    /// Retry configuration.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Send the request, retrying until a non-retryable outcome or the
    /// retry budget runs out.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub fn execute(&self, request: &RequestBuilder) -> Result<RequestOutcome> {
        let mut policy = RetryPolicy::new(self.retry.clone());

        loop {
            debug!(attempt = policy.attempts(), "Sending request");

            let failure = match self.transport.send(request) {
                Ok(response) if !is_retryable_status(response.status) => {
                    if policy.retries() > 0 {
                        info!(
                            status = response.status,
                            retries = policy.retries(),
                            "Request completed after retrying"
                        );
                    }
                    return Ok(RequestOutcome::from_response(response, policy.retries()));
                }
                Ok(response) => Failure::Status {
                    status: response.status,
                    reason: response.reason,
                },
                Err(failure) => Failure::Transport(failure),
            };

            let attempts = policy.attempts();
            match policy.next_delay() {
                Some(delay) => {
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure.describe(),
                        "Request failed, retrying"
                    );
                    std::thread::sleep(delay);
                }
                None => {
                    warn!(attempts, error = %failure.describe(), "Retries exhausted");
                    return Err(failure.into_error(attempts));
                }
            }
        }
    }
}
