//! The decision round trip: one POST to the PDP, one verdict back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::ResponseShape;
use crate::error::Error;
use crate::query::AuthzQuery;

/// Why a decision call produced no verdict.
///
/// The gate treats every variant the same way (it substitutes the configured
/// fallback), but the variants stay distinct so logs can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionFailure {
    /// The call did not complete within the configured timeout.
    #[error("decision call timed out after {0:?}")]
    Timeout(Duration),
    /// The PDP could not be reached (connect, DNS, reset, ...).
    #[error("transport error: {0}")]
    Transport(String),
    /// The PDP answered with a non-success status.
    #[error("PDP answered with HTTP {0}")]
    Status(u16),
    /// The response body was not JSON.
    #[error("malformed response body: {0}")]
    MalformedBody(String),
    /// The response was JSON but carried no boolean verdict.
    #[error("response carries no boolean verdict")]
    MissingVerdict,
}

impl DecisionFailure {
    /// Short, stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DecisionFailure::Timeout(_) => "timeout",
            DecisionFailure::Transport(_) => "transport",
            DecisionFailure::Status(_) => "status",
            DecisionFailure::MalformedBody(_) => "malformed_body",
            DecisionFailure::MissingVerdict => "missing_verdict",
        }
    }
}

/// Everything one decision call needs.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    /// Resolved decision URL
    pub endpoint: Url,
    /// Query document to POST
    pub query: AuthzQuery,
    /// Bound on the whole round trip
    pub timeout: Duration,
    /// Expected response schema
    pub response_shape: ResponseShape,
}

/// Submits one query to one PDP endpoint.
///
/// Implementations perform exactly one attempt and never retry. They report
/// failure through [`DecisionFailure`] instead of deciding what a failure
/// means; that is the gate's job.
#[async_trait]
pub trait DecisionClient: Send + Sync {
    /// Returns the PDP's verdict for `request`.
    async fn decide(&self, request: &DecisionRequest) -> Result<bool, DecisionFailure>;
}

#[async_trait]
impl<T> DecisionClient for Arc<T>
where
    T: DecisionClient + ?Sized,
{
    async fn decide(&self, request: &DecisionRequest) -> Result<bool, DecisionFailure> {
        (**self).decide(request).await
    }
}

/// [`DecisionClient`] over HTTP, backed by `reqwest`.
///
/// The underlying client pools connections transparently; no per-request
/// state is shared between calls.
#[derive(Debug, Clone)]
pub struct HttpDecisionClient {
    client: reqwest::Client,
}

impl HttpDecisionClient {
    /// Creates a client with default transport settings.
    ///
    /// # Errors
    ///
    /// [`Error::Client`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn round_trip(&self, request: &DecisionRequest) -> Result<bool, DecisionFailure> {
        let body = serde_json::to_vec(&request.query)
            .map_err(|e| DecisionFailure::Transport(format!("failed to encode query: {e}")))?;

        let response = self
            .client
            .post(request.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| DecisionFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecisionFailure::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DecisionFailure::Transport(e.to_string()))?;
        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| DecisionFailure::MalformedBody(e.to_string()))?;

        parse_verdict(&document, request.response_shape)
    }
}

#[async_trait]
impl DecisionClient for HttpDecisionClient {
    async fn decide(&self, request: &DecisionRequest) -> Result<bool, DecisionFailure> {
        let start = Instant::now();
        // Dropping the round trip on elapse abandons it; a late answer is never read.
        let result = match tokio::time::timeout(request.timeout, self.round_trip(request)).await {
            Ok(result) => result,
            Err(_) => Err(DecisionFailure::Timeout(request.timeout)),
        };

        tracing::debug!(
            endpoint = %request.endpoint,
            latency_ms = %start.elapsed().as_millis(),
            ok = result.is_ok(),
            "decision_call_completed"
        );
        result
    }
}

/// Extracts the verdict from a PDP response document.
///
/// # Errors
///
/// [`DecisionFailure::MissingVerdict`] when `result` does not have the shape
/// selected by `shape`.
///
/// # Examples
///
/// ```
/// use authz_gate::{parse_verdict, ResponseShape};
/// use serde_json::json;
///
/// assert_eq!(parse_verdict(&json!({"result": true}), ResponseShape::Auto), Ok(true));
/// assert_eq!(parse_verdict(&json!({"result": {"allow": false}}), ResponseShape::Auto), Ok(false));
/// assert!(parse_verdict(&json!({"result": {"allow": true}}), ResponseShape::Bare).is_err());
/// ```
pub fn parse_verdict(document: &Value, shape: ResponseShape) -> Result<bool, DecisionFailure> {
    let result = document.get("result").ok_or(DecisionFailure::MissingVerdict)?;

    let verdict = match (shape, result) {
        (ResponseShape::Bare | ResponseShape::Auto, Value::Bool(allow)) => Some(*allow),
        (ResponseShape::AllowObject | ResponseShape::Auto, Value::Object(object)) => {
            object.get("allow").and_then(Value::as_bool)
        }
        _ => None,
    };
    verdict.ok_or(DecisionFailure::MissingVerdict)
}
