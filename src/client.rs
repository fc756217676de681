use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_BAD_STATUS, CLIENT_MALFORMED_BODY, CLIENT_NETWORK_FAILURES, CLIENT_REQUEST_DURATION,
    CLIENT_REQUESTS, CLIENT_SUCCESSES,
};

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/api/chat";
/// Upper bound on a single call; expiry is reported as a network failure.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

///////////////////////////////////////////// Wire /////////////////////////////////////////////

/// Body posted to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The text of the turn being answered.
    pub query: String,
    /// Prior user turns as a 1-indexed, newline-joined list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queries: Option<String>,
}

impl ChatRequest {
    /// A request carrying only the latest query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            queries: None,
        }
    }

    /// A request that also forwards earlier user turns.
    ///
    /// The history is rendered as `"1. first\n2. second"`; an empty history
    /// yields an empty string rather than omitting the field.
    pub fn with_history<I, S>(query: impl Into<String>, prior: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            query: query.into(),
            queries: Some(number_history(prior)),
        }
    }
}

/// Body returned by the chat endpoint on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The persona's reply.
    pub response: String,
}

fn number_history<I, S>(prior: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    prior
        .into_iter()
        .enumerate()
        .map(|(idx, text)| format!("{}. {}", idx + 1, text.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/////////////////////////////////////////// Outcomes ///////////////////////////////////////////

/// Why a call did not yield a usable reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The call could not complete: refused, unreachable, reset, or timed out.
    Network,
    /// The endpoint answered with a non-success status.
    BadStatus,
    /// The endpoint answered successfully but the body was unusable.
    MalformedBody,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Network => write!(f, "network failure"),
            FailureKind::BadStatus => write!(f, "bad status"),
            FailureKind::MalformedBody => write!(f, "malformed body"),
        }
    }
}

/// The classified result of a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The reply field, exactly as received.
    Success(String),
    /// The call failed; see [`FailureKind`].
    Failure(FailureKind),
}

impl RemoteOutcome {
    /// Returns true for [`RemoteOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, RemoteOutcome::Success(_))
    }

    /// The failure kind, if any.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            RemoteOutcome::Success(_) => None,
            RemoteOutcome::Failure(kind) => Some(*kind),
        }
    }
}

/// Classifies a success-status response body.
///
/// Anything that is not a JSON object with a string `response` field is a
/// [`FailureKind::MalformedBody`].
pub fn parse_reply(body: &[u8]) -> RemoteOutcome {
    match decode_reply(body) {
        Ok(reply) => RemoteOutcome::Success(reply),
        Err(classified) => RemoteOutcome::Failure(classified.kind),
    }
}

fn decode_reply(body: &[u8]) -> std::result::Result<String, Classified> {
    serde_json::from_slice::<ChatResponse>(body)
        .map(|parsed| parsed.response)
        .map_err(|e| {
            Classified::new(
                FailureKind::MalformedBody,
                format!("Failed to parse response: {}", e),
            )
        })
}

//////////////////////////////////////////// Client ////////////////////////////////////////////

/// Issues one remote call per user turn.
///
/// Implementations never fail: every problem is folded into
/// [`RemoteOutcome::Failure`]. No retries.
#[async_trait::async_trait]
pub trait ResponseClient: Send + Sync {
    /// Send `request` and classify the result.
    async fn send(&self, request: &ChatRequest) -> RemoteOutcome;
}

#[async_trait::async_trait]
impl<C: ResponseClient + ?Sized> ResponseClient for Arc<C> {
    async fn send(&self, request: &ChatRequest) -> RemoteOutcome {
        (**self).send(request).await
    }
}

/// A failure plus the message explaining it, kept for logging.
struct Classified {
    kind: FailureKind,
    detail: String,
}

impl Classified {
    fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// [`ResponseClient`] that posts JSON over HTTP.
#[derive(Clone)]
pub struct HttpResponseClient {
    client: ReqwestClient,
    endpoint: Url,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl fmt::Debug for HttpResponseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponseClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl HttpResponseClient {
    /// Create a client for `endpoint` with the default timeout.
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_options(endpoint, None)
    }

    /// Create a client with custom settings.
    pub fn with_options(endpoint: &str, timeout: Option<Duration>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::validation(
                format!("unsupported scheme {:?}", endpoint.scheme()),
                Some("endpoint".to_string()),
            ));
        }

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(Error::validation(
                "timeout must be greater than zero",
                Some("timeout".to_string()),
            ));
        }
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            endpoint,
            timeout,
            logger: None,
        })
    }

    /// Attach a logger that sees every request and outcome.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The endpoint requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    async fn call(&self, request: &ChatRequest) -> std::result::Result<String, Classified> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(Self::default_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Classified::new(
                        FailureKind::Network,
                        format!("Request timed out after {:?}: {}", self.timeout, e),
                    )
                } else if e.is_connect() {
                    Classified::new(FailureKind::Network, format!("Connection error: {}", e))
                } else {
                    Classified::new(FailureKind::Network, format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::describe_status(response).await);
        }

        let body = response.bytes().await.map_err(|e| {
            Classified::new(
                FailureKind::Network,
                format!("Failed to read response body: {}", e),
            )
        })?;
        decode_reply(&body)
    }

    async fn describe_status(response: Response) -> Classified {
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("unknown status");
        let body = response.text().await.unwrap_or_default();
        let body = body.trim();
        if body.is_empty() {
            Classified::new(FailureKind::BadStatus, format!("{} {}", status.as_u16(), reason))
        } else {
            Classified::new(
                FailureKind::BadStatus,
                format!("{} {}: {}", status.as_u16(), reason, body),
            )
        }
    }
}

#[async_trait::async_trait]
impl ResponseClient for HttpResponseClient {
    async fn send(&self, request: &ChatRequest) -> RemoteOutcome {
        if let Some(logger) = &self.logger {
            logger.log_request(&self.endpoint, request);
        }
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = self.call(request).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let (outcome, detail) = match result {
            Ok(reply) => {
                CLIENT_SUCCESSES.click();
                (RemoteOutcome::Success(reply), None)
            }
            Err(classified) => {
                match classified.kind {
                    FailureKind::Network => CLIENT_NETWORK_FAILURES.click(),
                    FailureKind::BadStatus => CLIENT_BAD_STATUS.click(),
                    FailureKind::MalformedBody => CLIENT_MALFORMED_BODY.click(),
                }
                (
                    RemoteOutcome::Failure(classified.kind),
                    Some(classified.detail),
                )
            }
        };
        if let Some(logger) = &self.logger {
            logger.log_outcome(request, &outcome, detail.as_deref());
        }
        outcome
    }
}
