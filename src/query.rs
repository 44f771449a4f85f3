//! Authorization query construction.
//!
//! The query document is rebuilt from scratch for every request. Optional
//! fields are left out entirely rather than set to `null`, because policies
//! may test for their presence.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{AuthzConfig, EnrichTarget};
use crate::request::{PeerAddr, RequestSnapshot};

/// The document POSTed to the PDP: `{"input": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthzQuery {
    input: Map<String, Value>,
}

impl AuthzQuery {
    /// Returns the `input` object.
    pub fn input(&self) -> &Map<String, Value> {
        &self.input
    }

    /// Returns `input.request`, if present as an object.
    pub fn request(&self) -> Option<&Map<String, Value>> {
        self.input.get("request").and_then(Value::as_object)
    }

    /// Converts the document into a JSON value.
    pub fn to_value(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("input".to_string(), Value::Object(self.input.clone()));
        Value::Object(doc)
    }
}

/// Builds the authorization query for one request.
///
/// Method, path and query parameters are always present. Body and headers
/// follow `include_body`/`include_headers`. Peer structures appear only when
/// the snapshot knows the connection endpoints. `resources.attributes` is
/// always an object, empty without route parameters. Enrichment is merged
/// last and overrides computed keys of the same name.
///
/// # Examples
///
/// ```
/// use authz_gate::{build_query, AuthzConfig, RequestSnapshot};
///
/// let snapshot = RequestSnapshot::new("GET", "/users/42").with_route_param("userId", "42");
/// let config = AuthzConfig::default().include_headers(false).enrich("data", 123);
///
/// let query = build_query(&snapshot, &config);
/// let doc = query.to_value();
///
/// assert_eq!(doc["input"]["request"]["method"], "GET");
/// assert_eq!(doc["input"]["resources"]["attributes"]["userId"], "42");
/// assert_eq!(doc["input"]["data"], 123);
/// assert!(doc["input"]["request"].get("headers").is_none());
/// ```
pub fn build_query(snapshot: &RequestSnapshot, config: &AuthzConfig) -> AuthzQuery {
    let mut input = Map::new();

    input.insert(
        "request".to_string(),
        Value::Object(request_attributes(snapshot, config)),
    );
    if let Some(remote) = snapshot.remote_addr() {
        input.insert("source".to_string(), peer(remote));
    }
    if let Some(local) = snapshot.local_addr() {
        input.insert("destination".to_string(), peer(local));
    }
    input.insert("resources".to_string(), resources(snapshot));

    match config.enrich_target {
        EnrichTarget::Input => merge(&mut input, &config.enrich),
        EnrichTarget::Request => {
            if let Some(Value::Object(request)) = input.get_mut("request") {
                merge(request, &config.enrich);
            }
        }
    }

    AuthzQuery { input }
}

fn request_attributes(snapshot: &RequestSnapshot, config: &AuthzConfig) -> Map<String, Value> {
    let mut request = Map::new();
    request.insert(
        "method".to_string(),
        Value::String(snapshot.method().to_string()),
    );
    request.insert("query".to_string(), query_params(snapshot));
    request.insert("path".to_string(), Value::String(snapshot.path().to_string()));

    if config.include_body {
        if let Some(body) = snapshot.body() {
            request.insert("body".to_string(), body.clone());
        }
    }
    if config.include_headers {
        let headers = snapshot
            .headers()
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        request.insert("headers".to_string(), Value::Object(headers));
    }
    if let Some(scheme) = snapshot.scheme() {
        request.insert("scheme".to_string(), Value::String(scheme.to_string()));
    }
    if let Some(host) = snapshot.host() {
        request.insert("host".to_string(), Value::String(host.to_string()));
    }
    request
}

/// Single values stay strings; repeated keys become arrays.
fn query_params(snapshot: &RequestSnapshot) -> Value {
    let params = snapshot
        .query()
        .iter()
        .map(|(key, values)| {
            let value = match values.as_slice() {
                [single] => Value::String(single.clone()),
                many => Value::Array(many.iter().cloned().map(Value::String).collect()),
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(params)
}

fn peer(peer: &PeerAddr) -> Value {
    let mut map = Map::new();
    map.insert(
        "address".to_string(),
        Value::String(peer.addr.ip().to_string()),
    );
    map.insert("port".to_string(), Value::from(peer.addr.port()));
    Value::Object(map)
}

fn resources(snapshot: &RequestSnapshot) -> Value {
    let attributes = snapshot
        .route_params()
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();

    let mut resources = Map::new();
    resources.insert("attributes".to_string(), Value::Object(attributes));
    if let Some(permissions) = snapshot.permissions() {
        let list = permissions
            .as_slice()
            .iter()
            .cloned()
            .map(Value::String)
            .collect();
        resources.insert("permissions".to_string(), Value::Array(list));
    }
    Value::Object(resources)
}

fn merge(target: &mut Map<String, Value>, extra: &Map<String, Value>) {
    for (key, value) in extra {
        target.insert(key.clone(), value.clone());
    }
}
