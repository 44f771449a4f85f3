//! Route annotation with declared permissions.

use std::task::{Context, Poll};

use axum::http::Request;
use tower::{Layer, Service};

use crate::request::Permissions;

/// Creates a [`PermissionsLayer`] declaring `list` for the wrapped route.
///
/// Layer order matters: the annotation must run before the authorization
/// layer so it shows up as `resources.permissions` in the query. With axum,
/// the layer added last runs first:
///
/// ```no_run
/// use axum::{routing::get, Router};
/// use authz_gate::web::{permissions, AuthzLayer};
/// use authz_gate::{AuthzConfig, Endpoint};
///
/// let authz = AuthzLayer::http(AuthzConfig::new(Endpoint::parts("pdp", 8181, "authz/allow")))
///     .expect("HTTP client");
///
/// let app: Router = Router::new().route(
///     "/users/{user_id}",
///     get(|| async { "ok" })
///         .route_layer(authz)
///         .route_layer(permissions(["user.read"])),
/// );
/// ```
pub fn permissions<I, S>(list: I) -> PermissionsLayer
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    PermissionsLayer::new(list)
}

/// Layer that attaches a fixed [`Permissions`] set to every request.
///
/// An empty set is still attached, so the policy sees an empty
/// `resources.permissions` list rather than no list.
#[derive(Debug, Clone, Default)]
pub struct PermissionsLayer {
    permissions: Permissions,
}

impl PermissionsLayer {
    /// Creates a layer declaring `list`, in order.
    pub fn new<I, S>(list: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: Permissions::new(list),
        }
    }
}

impl<S> Layer<S> for PermissionsLayer {
    type Service = PermissionsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PermissionsService {
            inner,
            permissions: self.permissions.clone(),
        }
    }
}

/// Service produced by [`PermissionsLayer`].
#[derive(Debug, Clone)]
pub struct PermissionsService<S> {
    inner: S,
    permissions: Permissions,
}

impl<S, B> Service<Request<B>> for PermissionsService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        request.extensions_mut().insert(self.permissions.clone());
        self.inner.call(request)
    }
}
