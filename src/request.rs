//! Request-scoped inputs to the authorization pipeline.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use serde_json::Value;

/// An immutable view of one inbound request, as seen by the gate.
///
/// `RequestSnapshot` holds simple, owned data so the pipeline does not depend on
/// any framework's request type. Framework integrations (see [`crate::web`])
/// build one per request; the configuration provider and the query builder
/// only ever read it.
///
/// # Examples
///
/// ```
/// use authz_gate::RequestSnapshot;
///
/// let snapshot = RequestSnapshot::new("GET", "/region/eu/users/42")
///     .with_query_param("verbose", "1")
///     .with_header("x-tenant", "acme")
///     .with_route_param("userId", "42");
///
/// assert_eq!(snapshot.method(), "GET");
/// assert_eq!(snapshot.route_params().get("userId").map(String::as_str), Some("42"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestSnapshot {
    method: String,
    path: String,
    query: BTreeMap<String, Vec<String>>,
    headers: BTreeMap<String, String>,
    body: Option<Value>,
    route_params: BTreeMap<String, String>,
    scheme: Option<String>,
    host: Option<String>,
    local_addr: Option<PeerAddr>,
    remote_addr: Option<PeerAddr>,
    permissions: Option<Permissions>,
}

impl RequestSnapshot {
    /// Creates a snapshot with a method and path; everything else starts empty.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Adds a query parameter. Repeated keys keep every value in order.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Adds a header. Names are lowercased; a repeated name is joined with `", "`.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        self.headers
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
        self
    }

    /// Adds a route parameter resolved by the hosting router.
    pub fn with_route_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_params.insert(key.into(), value.into());
        self
    }

    /// Sets the parsed request body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the body from raw bytes.
    ///
    /// Bytes that parse as JSON are kept as JSON, other UTF-8 is kept as a
    /// string, and empty or non-UTF-8 bodies are left absent.
    pub fn with_raw_body(mut self, bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return self;
        }
        self.body = match serde_json::from_slice::<Value>(bytes) {
            Ok(json) => Some(json),
            Err(_) => std::str::from_utf8(bytes)
                .ok()
                .map(|text| Value::String(text.to_string())),
        };
        self
    }

    /// Sets the request scheme (`http`/`https`) when known.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Sets the requested host when known.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the local (server-side) endpoint of the connection.
    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(PeerAddr::from(addr));
        self
    }

    /// Sets the remote (client-side) endpoint of the connection.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(PeerAddr::from(addr));
        self
    }

    /// Attaches a declared permission set. See [`Permissions::annotate`].
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Returns the uppercase HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the query parameters.
    pub fn query(&self) -> &BTreeMap<String, Vec<String>> {
        &self.query
    }

    /// Returns the headers, keyed by lowercase name.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the body, if one was attached.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Returns the route parameters.
    pub fn route_params(&self) -> &BTreeMap<String, String> {
        &self.route_params
    }

    /// Returns the scheme, if known.
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Returns the host, if known.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the local endpoint, if known.
    pub fn local_addr(&self) -> Option<&PeerAddr> {
        self.local_addr.as_ref()
    }

    /// Returns the remote endpoint, if known.
    pub fn remote_addr(&self) -> Option<&PeerAddr> {
        self.remote_addr.as_ref()
    }

    /// Returns the declared permission set, if the request was annotated.
    pub fn permissions(&self) -> Option<&Permissions> {
        self.permissions.as_ref()
    }
}

/// One side of the underlying connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr {
    /// Socket address of the peer
    pub addr: SocketAddr,
}

impl From<SocketAddr> for PeerAddr {
    fn from(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

/// An ordered list of permission identifiers a route declares it requires.
///
/// Permissions are metadata for the policy: they are forwarded in the query
/// document and never evaluated locally.
///
/// # Examples
///
/// ```
/// use authz_gate::{Permissions, RequestSnapshot};
///
/// let snapshot = RequestSnapshot::new("GET", "/users/42");
/// let annotated = Permissions::new(["user.read", "user.write"]).annotate(snapshot);
///
/// let declared = annotated.permissions().unwrap();
/// assert_eq!(declared.as_slice(), ["user.read", "user.write"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(Vec<String>);

impl Permissions {
    /// Creates a permission set, keeping the given order.
    pub fn new<I, S>(list: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(list.into_iter().map(Into::into).collect())
    }

    /// Creates an empty permission set.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// Attaches this set to a request snapshot, replacing any earlier annotation.
    pub fn annotate(&self, snapshot: RequestSnapshot) -> RequestSnapshot {
        snapshot.with_permissions(self.clone())
    }

    /// Returns the identifiers in declaration order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns the number of identifiers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no identifiers were declared.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
