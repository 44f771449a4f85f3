//! Request adapter for mapping HTTP request parts to a [`RequestSnapshot`].

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, RawPathParams};
use axum::http::header::HOST;
use axum::http::request::Parts;

use crate::request::{Permissions, RequestSnapshot};

/// Local (server-side) address of the connection a request arrived on.
///
/// Axum exposes the remote peer through [`ConnectInfo`] but has no standard
/// slot for the local one. Hosting code that knows it can insert this
/// extension; without it, `input.destination` is left out of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalAddr(pub SocketAddr);

/// Builds a body-less snapshot from request parts.
///
/// Collected:
/// - method, path, and query parameters from the URI
/// - headers with UTF-8 values (others are skipped)
/// - host from the URI authority or the `Host` header, scheme from the URI
/// - route parameters, when the request has already been routed
///   (the layer is applied per route or with `route_layer`)
/// - the remote peer from `ConnectInfo<SocketAddr>`, the local one from [`LocalAddr`]
/// - a [`Permissions`] annotation left by an earlier layer
///
/// The body is attached separately because buffering it depends on the
/// request's configuration.
pub async fn snapshot_from_parts(parts: &mut Parts) -> RequestSnapshot {
    let mut snapshot = RequestSnapshot::new(parts.method.as_str(), parts.uri.path());

    if let Some(query) = parts.uri.query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            snapshot = snapshot.with_query_param(key, value);
        }
    }

    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            snapshot = snapshot.with_header(name.as_str(), value);
        }
    }

    if let Some(scheme) = parts.uri.scheme_str() {
        snapshot = snapshot.with_scheme(scheme);
    }
    let host = parts
        .uri
        .authority()
        .map(|authority| authority.as_str().to_string())
        .or_else(|| {
            parts
                .headers
                .get(HOST)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        });
    if let Some(host) = host {
        snapshot = snapshot.with_host(host);
    }

    // Unrouted requests have no parameters; that is not an error.
    if let Ok(params) = RawPathParams::from_request_parts(parts, &()).await {
        for (key, value) in &params {
            snapshot = snapshot.with_route_param(key, value);
        }
    }

    if let Some(ConnectInfo(remote)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        snapshot = snapshot.with_remote_addr(*remote);
    }
    if let Some(LocalAddr(local)) = parts.extensions.get::<LocalAddr>() {
        snapshot = snapshot.with_local_addr(*local);
    }
    if let Some(permissions) = parts.extensions.get::<Permissions>() {
        snapshot = snapshot.with_permissions(permissions.clone());
    }

    snapshot
}
