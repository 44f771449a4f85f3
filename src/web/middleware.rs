//! Tower layer that puts the authorization gate in front of a service.
//!
//! # Request flow
//!
//! ```text
//! Request
//!   ↓
//! snapshot_from_parts (no body yet)
//!   ↓
//! ConfigProvider::config_for ── disabled ──→ inner service
//!   ↓
//! buffer body (only when include_body)
//!   ↓
//! AuthzGate::authorize
//!   ├─ pass   → inner service (exactly once)
//!   ├─ reject → 403 "Unauthorized"
//!   └─ config error → 500
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tower::{Layer, Service};

use crate::config::ConfigProvider;
use crate::decision::{DecisionClient, HttpDecisionClient};
use crate::error::Error;
use crate::gate::{AuthzGate, REJECTION_BODY};
use crate::logging::GateLog;

use super::adapter::snapshot_from_parts;

/// Largest request body buffered for the PDP by default (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Builds the fixed rejection response: 403 with a plain-text body.
pub fn rejection() -> Response {
    (StatusCode::FORBIDDEN, REJECTION_BODY).into_response()
}

fn misconfigured() -> Response {
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Layer applying an [`AuthzGate`] to every request of the wrapped service.
///
/// Apply it per route (or with `Router::route_layer`) so route parameters are
/// already resolved and reach the policy as `resources.attributes`.
///
/// # Examples
///
/// ```no_run
/// use axum::{routing::get, Router};
/// use authz_gate::web::AuthzLayer;
/// use authz_gate::{AuthzConfig, Endpoint, RequestSnapshot};
///
/// let authz = AuthzLayer::http(|req: &RequestSnapshot| {
///     AuthzConfig::new(Endpoint::parts("http://localhost", 8181, "httpapi/authz/allow"))
///         .enabled(req.method() == "GET")
/// })
/// .expect("HTTP client");
///
/// let app: Router = Router::new()
///     .route("/users/{user_id}", get(|| async { "allowed" }))
///     .route_layer(authz);
/// ```
pub struct AuthzLayer<C = HttpDecisionClient> {
    gate: Arc<AuthzGate<C>>,
    max_body_bytes: usize,
}

impl AuthzLayer<HttpDecisionClient> {
    /// Creates a layer whose gate talks to the PDP over HTTP.
    ///
    /// # Errors
    ///
    /// [`Error::Client`] if the HTTP client cannot be constructed.
    pub fn http(provider: impl ConfigProvider + 'static) -> Result<Self, Error> {
        Ok(Self::new(AuthzGate::http(provider)?))
    }
}

impl<C> AuthzLayer<C> {
    /// Creates a layer around `gate`.
    pub fn new(gate: AuthzGate<C>) -> Self {
        Self::from_shared(Arc::new(gate))
    }

    /// Creates a layer around a gate shared with other layers.
    pub fn from_shared(gate: Arc<AuthzGate<C>>) -> Self {
        Self {
            gate,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Sets the largest body buffered for the PDP; larger requests get 413.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

impl<C> Clone for AuthzLayer<C> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl<S, C> Layer<S> for AuthzLayer<C> {
    type Service = AuthzService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthzService {
            inner,
            gate: Arc::clone(&self.gate),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Service produced by [`AuthzLayer`].
pub struct AuthzService<S, C = HttpDecisionClient> {
    inner: S,
    gate: Arc<AuthzGate<C>>,
    max_body_bytes: usize,
}

impl<S: Clone, C> Clone for AuthzService<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: Arc::clone(&self.gate),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl<S, C> Service<Request<Body>> for AuthzService<S, C>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    C: DecisionClient + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // Use the instance that was polled ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = Arc::clone(&self.gate);
        let max_body_bytes = self.max_body_bytes;

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            let snapshot = snapshot_from_parts(&mut parts).await;
            let config = gate.config_for(&snapshot);

            let (snapshot, body) = if config.enabled && config.include_body {
                // Configuration errors take precedence over body errors.
                if let Err(e) = config.resolve_endpoint() {
                    GateLog::for_request(&snapshot)
                        .error(format_args!("authorization misconfigured: {}", e));
                    return Ok(misconfigured());
                }
                match read_body(body, max_body_bytes).await {
                    Ok(bytes) => (snapshot.with_raw_body(&bytes), Body::from(bytes)),
                    Err(status) => {
                        GateLog::for_request(&snapshot).warn(format_args!(
                            "request body unreadable for authorization: {}",
                            status
                        ));
                        return Ok(status.into_response());
                    }
                }
            } else {
                (snapshot, body)
            };

            match gate.authorize(&snapshot, &config).await {
                Ok(outcome) if outcome.is_pass() => {
                    inner.call(Request::from_parts(parts, body)).await
                }
                Ok(_) => Ok(rejection()),
                Err(_) => Ok(misconfigured()),
            }
        })
    }
}

/// Buffers a body up to `limit` bytes.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, StatusCode> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(StatusCode::PAYLOAD_TOO_LARGE),
        Err(_) => Err(StatusCode::BAD_REQUEST),
    }
}
