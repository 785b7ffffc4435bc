//! Resilient request execution: snapshot capture, retry, cancellation and
//! credential injection.
//!
//! # Design
//! - A [`RequestSnapshot`] is captured once per logical call. Each attempt
//!   materialises a fresh [`OutboundRequest`] from it, so retries resend the
//!   exact same bytes.
//! - Every attempt outcome is classified once into an [`AttemptFailure`]
//!   carrying an explicit `retryable` flag; the retry loop never inspects
//!   error types.
//! - Attempts are strictly sequential. Cancellation is raced against both the
//!   in-flight attempt and the backoff sleep, with cancellation polled first.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flagdeck_api_models::ProblemDetails;
use flagdeck_config::Credential;
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, InvalidHeaderValue,
};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::cancel::Cancellation;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
const JSON_MEDIA_TYPE: &str = "application/json";
const MAX_DETAIL_CHARS: usize = 200;

/// Default number of attempts per logical call.
pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(3) {
    Some(attempts) => attempts,
    None => NonZeroU32::MIN,
};
/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
/// Upper bound for any single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

/// Retry budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts per logical call, including the first.
    pub max_attempts: NonZeroU32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap applied to the exponential delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Policy retrying without any delay between attempts.
    #[must_use]
    pub const fn immediate(max_attempts: NonZeroU32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether a non-success status is worth another attempt.
    ///
    /// Server errors, request timeouts and rate limiting are transient; every
    /// other client error is terminal.
    #[must_use]
    pub fn is_retryable(&self, status: StatusCode) -> bool {
        status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Delay after the given failed attempt (1-based) before the next one.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }
}

/// Immutable, replayable description of one logical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    method: Method,
    url: Url,
    body: Option<Vec<u8>>,
    content_type: Option<&'static str>,
}

impl RequestSnapshot {
    /// Capture a request, serialising the body to JSON bytes up front.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Encode`] when the body cannot be serialised.
    pub fn capture<B>(method: Method, url: Url, body: Option<&B>) -> Result<Self, PipelineError>
    where
        B: Serialize + ?Sized,
    {
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|source| PipelineError::Encode { source })?;
        let content_type = body.as_ref().map(|_| JSON_MEDIA_TYPE);
        Ok(Self {
            method,
            url,
            body,
            content_type,
        })
    }

    /// HTTP method of the request.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Absolute request URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Buffered body bytes, if any.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Build a fresh request for one attempt, attaching the credential.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidHeader`] when the credential cannot be
    /// encoded as a header value.
    pub fn materialize(
        &self,
        credential: Option<&Credential>,
    ) -> Result<OutboundRequest, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
        if let Some(content_type) = self.content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        if let Some(credential) = credential {
            let mut value = HeaderValue::from_str(&credential.header_value())
                .map_err(|source| PipelineError::InvalidHeader {
                    name: "authorization",
                    source,
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(OutboundRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers,
            body: self.body.clone(),
        })
    }
}

/// Single attempt handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: Url,
    /// Request headers, including credentials.
    pub headers: HeaderMap,
    /// Body bytes copied from the snapshot.
    pub body: Option<Vec<u8>>,
}

/// Fully buffered response of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response body bytes.
    pub body: Vec<u8>,
}

/// Connection-level failure of a single attempt.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    retryable: bool,
    #[source]
    source: Option<reqwest::Error>,
}

impl TransportError {
    /// Transient failure without an underlying client error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            source: None,
        }
    }

    /// Failure that resending the same request cannot fix.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            retryable: false,
            ..Self::new(message)
        }
    }

    /// Whether another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn from_reqwest(message: String, source: reqwest::Error) -> Self {
        Self {
            message,
            // A request the client refused to build fails the same way every time.
            retryable: !source.is_builder(),
            source: Some(source),
        }
    }
}

#[async_trait]
/// Performs exactly one HTTP exchange.
pub trait Transport: Send + Sync {
    /// Send the request and buffer the full response.
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client with the given timeout and a per-process request id.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Client`] when the client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(&Uuid::new_v4().to_string())
            .map_err(|source| PipelineError::InvalidHeader {
                name: HEADER_REQUEST_ID,
                source,
            })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|source| PipelineError::Client { source })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let url = request.url.clone();
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::from_reqwest(format!("request to {url} failed"), err))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|err| {
            TransportError::from_reqwest(format!("failed to read response from {url}"), err)
        })?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// What went wrong in a failed attempt.
#[derive(Debug)]
pub enum FailureKind {
    /// The server answered with a non-success status.
    Status {
        /// Response status.
        status: StatusCode,
        /// Canonical reason phrase.
        reason: String,
        /// Message extracted from the response body.
        detail: Option<String>,
    },
    /// No response was received.
    Transport(TransportError),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, reason, .. } => write!(formatter, "{} {reason}", status.as_u16()),
            Self::Transport(err) => write!(formatter, "{err}"),
        }
    }
}

/// Classified outcome of a failed attempt.
#[derive(Debug)]
pub struct AttemptFailure {
    /// Whether another attempt may succeed.
    pub retryable: bool,
    /// Failure details.
    pub kind: FailureKind,
}

impl AttemptFailure {
    fn into_error(self) -> PipelineError {
        match self.kind {
            FailureKind::Status {
                status,
                reason,
                detail,
            } => PipelineError::HttpStatus {
                status,
                reason,
                detail,
            },
            FailureKind::Transport(source) => PipelineError::Transport { source },
        }
    }
}

/// Terminal outcome of a logical call.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The invocation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
    /// The server rejected the request with a non-retryable status.
    #[error("http request failed")]
    HttpStatus {
        /// Response status.
        status: StatusCode,
        /// Canonical reason phrase.
        reason: String,
        /// Message extracted from the response body.
        detail: Option<String>,
    },
    /// Every attempt failed with a retryable failure.
    #[error("retry budget exhausted")]
    RetryExhausted {
        /// Attempts performed.
        attempts: u32,
        /// Failure of the final attempt.
        last_failure: Box<FailureKind>,
    },
    /// A transport failure that resending cannot fix.
    #[error("transport failure")]
    Transport {
        /// Underlying transport error.
        source: TransportError,
    },
    /// Request body could not be serialised.
    #[error("failed to encode request body")]
    Encode {
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// Response body did not match the expected document.
    #[error("failed to decode response body")]
    Decode {
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// Request path could not be joined onto the API host.
    #[error("invalid request path")]
    InvalidUrl {
        /// Relative path that failed to join.
        path: String,
        /// Underlying URL error.
        source: url::ParseError,
    },
    /// A header value contained characters HTTP does not allow.
    #[error("value cannot be encoded as a header")]
    InvalidHeader {
        /// Header name.
        name: &'static str,
        /// Underlying header error.
        source: InvalidHeaderValue,
    },
    /// HTTP client construction failed.
    #[error("failed to build HTTP client")]
    Client {
        /// Underlying client error.
        source: reqwest::Error,
    },
}

/// Executes snapshots through a [`Transport`] under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl fmt::Debug for RequestPipeline {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RequestPipeline")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RequestPipeline {
    /// Pipeline over the given transport and policy.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Active retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute one logical call, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Cancelled`] once `cancel` fires; no further attempt starts.
    /// - [`PipelineError::HttpStatus`] for the first non-retryable status.
    /// - [`PipelineError::RetryExhausted`] after `max_attempts` retryable failures.
    #[instrument(
        name = "pipeline.execute",
        skip_all,
        fields(method = %snapshot.method, url = %snapshot.url)
    )]
    pub async fn execute(
        &self,
        snapshot: &RequestSnapshot,
        credential: Option<&Credential>,
        cancel: &Cancellation,
    ) -> Result<TransportResponse, PipelineError> {
        let max_attempts = self.policy.max_attempts.get();
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let request = snapshot.materialize(credential)?;
            debug!(attempt, max_attempts, "sending request");
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PipelineError::Cancelled),
                outcome = self.transport.send(request) => outcome,
            };

            let failure = match self.classify(outcome) {
                Ok(response) => {
                    debug!(attempt, status = %response.status, "request succeeded");
                    return Ok(response);
                }
                Err(failure) => failure,
            };

            if !failure.retryable {
                debug!(attempt, failure = %failure.kind, "request failed permanently");
                return Err(failure.into_error());
            }
            if attempt >= max_attempts {
                warn!(attempt, failure = %failure.kind, "retry budget exhausted");
                return Err(PipelineError::RetryExhausted {
                    attempts: attempt,
                    last_failure: Box::new(failure.kind),
                });
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                attempt,
                max_attempts,
                failure = %failure.kind,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying request"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PipelineError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    fn classify(
        &self,
        outcome: Result<TransportResponse, TransportError>,
    ) -> Result<TransportResponse, AttemptFailure> {
        match outcome {
            Ok(response) if response.status.is_success() => Ok(response),
            Ok(response) => Err(AttemptFailure {
                retryable: self.policy.is_retryable(response.status),
                kind: FailureKind::Status {
                    status: response.status,
                    reason: response
                        .status
                        .canonical_reason()
                        .unwrap_or("Unknown")
                        .to_string(),
                    detail: failure_detail(&response.body),
                },
            }),
            Err(err) => Err(AttemptFailure {
                retryable: err.is_retryable(),
                kind: FailureKind::Transport(err),
            }),
        }
    }
}

fn failure_detail(body: &[u8]) -> Option<String> {
    if let Ok(problem) = serde_json::from_slice::<ProblemDetails>(body)
        && let Some(message) = problem.message()
    {
        return Some(message.to_string());
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    (!text.is_empty()).then(|| text.chars().take(MAX_DETAIL_CHARS).collect())
}
