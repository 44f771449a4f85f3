//! Per-request authorization configuration.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::endpoint;
use crate::error::Error;
use crate::request::RequestSnapshot;

/// Default bound on one decision call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Port assumed when options name a hostname without a port.
pub const DEFAULT_PDP_PORT: u16 = 8181;

/// Where the decision endpoint lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A fully formed decision URL, used as is.
    Url(String),
    /// A hostname/port/policy-path triple, resolved by [`endpoint::resolve`].
    Parts {
        /// Host, with or without a scheme
        hostname: String,
        /// TCP port of the PDP
        port: u16,
        /// Policy path below the data API root
        policy_path: String,
    },
}

impl Endpoint {
    /// Builds a triple-form endpoint.
    pub fn parts(hostname: impl Into<String>, port: u16, policy_path: impl Into<String>) -> Self {
        Endpoint::Parts {
            hostname: hostname.into(),
            port,
            policy_path: policy_path.into(),
        }
    }

    /// Resolves this descriptor into an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] for malformed descriptors.
    pub fn resolve(&self) -> Result<Url, Error> {
        match self {
            Endpoint::Url(raw) => endpoint::resolve_url(raw),
            Endpoint::Parts {
                hostname,
                port,
                policy_path,
            } => endpoint::resolve(hostname, *port, policy_path),
        }
    }
}

/// Which PDP response schema to expect.
///
/// `Auto` reads `result` as a boolean when it is one, and as `result.allow`
/// when `result` is an object. The explicit variants accept only their own
/// shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseShape {
    /// `{"result": true}`
    Bare,
    /// `{"result": {"allow": true}}`
    AllowObject,
    /// Either of the above, chosen by inspecting `result`.
    #[default]
    Auto,
}

/// Where `enrich` keys are merged into the query document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnrichTarget {
    /// Top level of `input`.
    #[default]
    Input,
    /// Inside `input.request`.
    Request,
}

/// Complete authorization configuration for one request.
///
/// Every option has a named default (see [`AuthzConfig::default`]); setters
/// consume and return the config so providers can be written as one
/// expression.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use authz_gate::{AuthzConfig, Endpoint};
///
/// let config = AuthzConfig::new(Endpoint::parts("authz.internal", 8181, "httpapi/authz/allow"))
///     .include_body(false)
///     .timeout(Duration::from_millis(250))
///     .enrich("serviceId", 1);
///
/// assert!(config.enabled);
/// assert!(!config.allow_on_failure);
/// assert_eq!(config.enrich["serviceId"], 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AuthzConfig {
    /// Whether the request is subject to authorization at all
    pub enabled: bool,
    /// Verdict assumed when the PDP call cannot be completed
    pub allow_on_failure: bool,
    /// Forward the request body to the PDP
    pub include_body: bool,
    /// Forward the request headers to the PDP
    pub include_headers: bool,
    /// Bound on the decision call
    pub timeout: Duration,
    /// Extra keys merged last into the query document
    pub enrich: Map<String, Value>,
    /// Where enrichment is merged
    pub enrich_target: EnrichTarget,
    /// Decision endpoint; required when `enabled`
    pub endpoint: Option<Endpoint>,
    /// Expected PDP response schema
    pub response_shape: ResponseShape,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_on_failure: false,
            include_body: true,
            include_headers: true,
            timeout: DEFAULT_TIMEOUT,
            enrich: Map::new(),
            enrich_target: EnrichTarget::default(),
            endpoint: None,
            response_shape: ResponseShape::default(),
        }
    }
}

impl AuthzConfig {
    /// Creates a default config pointing at `endpoint`.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint: Some(endpoint),
            ..Self::default()
        }
    }

    /// Creates a config that bypasses authorization.
    pub fn bypass() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets whether the request is subject to authorization.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the fail-open (`true`) or fail-closed (`false`) policy.
    pub fn allow_on_failure(mut self, allow: bool) -> Self {
        self.allow_on_failure = allow;
        self
    }

    /// Sets whether the body is forwarded.
    pub fn include_body(mut self, include: bool) -> Self {
        self.include_body = include;
        self
    }

    /// Sets whether headers are forwarded.
    pub fn include_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }

    /// Sets the decision-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds one enrichment key.
    pub fn enrich(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.enrich.insert(key.into(), value.into());
        self
    }

    /// Replaces the enrichment map.
    pub fn enrich_all(mut self, enrich: Map<String, Value>) -> Self {
        self.enrich = enrich;
        self
    }

    /// Sets where enrichment is merged.
    pub fn enrich_target(mut self, target: EnrichTarget) -> Self {
        self.enrich_target = target;
        self
    }

    /// Sets the decision endpoint.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets the expected response schema.
    pub fn response_shape(mut self, shape: ResponseShape) -> Self {
        self.response_shape = shape;
        self
    }

    /// Resolves the configured endpoint.
    ///
    /// # Errors
    ///
    /// [`Error::MissingEndpoint`] when none is set, [`Error::InvalidEndpoint`]
    /// when it is malformed.
    pub fn resolve_endpoint(&self) -> Result<Url, Error> {
        self.endpoint
            .as_ref()
            .ok_or(Error::MissingEndpoint)?
            .resolve()
    }
}

/// Raw, partially specified options in the PDP middleware's JSON vocabulary.
///
/// This is the serialized form of the configuration surface. Converting it
/// with [`AuthzOptions::into_config`] applies the defaults one field at a
/// time; unknown keys are rejected at parse time.
///
/// # Examples
///
/// ```
/// use authz_gate::AuthzOptions;
///
/// let options: AuthzOptions = serde_json::from_str(
///     r#"{"hostname": "http://localhost", "policyPath": "/authz/allow", "filter": true, "allowOnFail": true}"#,
/// ).unwrap();
/// let config = options.into_config().unwrap();
///
/// assert!(config.allow_on_failure);
/// assert_eq!(
///     config.resolve_endpoint().unwrap().as_str(),
///     "http://localhost:8181/v1/data/authz/allow"
/// );
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthzOptions {
    /// Whether authorization applies (aliases: `filter`, `enable`)
    #[serde(alias = "filter", alias = "enable")]
    pub enabled: Option<bool>,
    /// Fail-open switch (alias: `allowOnFail`)
    #[serde(alias = "allowOnFail")]
    pub allow_on_failure: Option<bool>,
    /// Forward the body
    pub include_body: Option<bool>,
    /// Forward the headers
    pub include_headers: Option<bool>,
    /// Timeout in milliseconds
    pub timeout: Option<u64>,
    /// Enrichment keys
    pub enrich: Option<Map<String, Value>>,
    /// Enrichment merge location
    pub enrich_target: Option<EnrichTarget>,
    /// PDP host, with or without scheme
    pub hostname: Option<String>,
    /// PDP port
    pub port: Option<u16>,
    /// Policy path
    pub policy_path: Option<String>,
    /// Complete decision URL
    pub authz_server: Option<String>,
    /// Response schema
    pub response_shape: Option<ResponseShape>,
}

impl AuthzOptions {
    /// Parses options from a JSON document.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOptions`] for malformed JSON, wrong types or unknown keys.
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidOptions(e.to_string()))
    }

    /// Produces a complete config, filling every absent option with its default.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOptions`] when both endpoint forms are given, or when
    /// `port`/`policyPath` appear without `hostname`.
    pub fn into_config(self) -> Result<AuthzConfig, Error> {
        let defaults = AuthzConfig::default();
        let endpoint = self.endpoint()?;

        Ok(AuthzConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            allow_on_failure: self.allow_on_failure.unwrap_or(defaults.allow_on_failure),
            include_body: self.include_body.unwrap_or(defaults.include_body),
            include_headers: self.include_headers.unwrap_or(defaults.include_headers),
            timeout: self
                .timeout
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            enrich: self.enrich.unwrap_or(defaults.enrich),
            enrich_target: self.enrich_target.unwrap_or(defaults.enrich_target),
            endpoint,
            response_shape: self.response_shape.unwrap_or(defaults.response_shape),
        })
    }

    fn endpoint(&self) -> Result<Option<Endpoint>, Error> {
        match (&self.authz_server, &self.hostname) {
            (Some(_), Some(_)) => Err(Error::InvalidOptions(
                "authzServer and hostname are mutually exclusive".to_string(),
            )),
            (Some(_), None) if self.port.is_some() || self.policy_path.is_some() => {
                Err(Error::InvalidOptions(
                    "port and policyPath require hostname, not authzServer".to_string(),
                ))
            }
            (Some(url), None) => Ok(Some(Endpoint::Url(url.clone()))),
            (None, Some(hostname)) => Ok(Some(Endpoint::parts(
                hostname.clone(),
                self.port.unwrap_or(DEFAULT_PDP_PORT),
                self.policy_path.clone().unwrap_or_default(),
            ))),
            (None, None) if self.port.is_some() || self.policy_path.is_some() => Err(
                Error::InvalidOptions("port and policyPath require hostname".to_string()),
            ),
            (None, None) => Ok(None),
        }
    }
}

/// Computes the configuration for one request.
///
/// Providers are called exactly once per request with an immutable snapshot
/// and must not rely on state carried over from other requests. Any
/// `Fn(&RequestSnapshot) -> AuthzConfig` closure is a provider.
///
/// # Examples
///
/// ```
/// use authz_gate::{AuthzConfig, ConfigProvider, Endpoint, RequestSnapshot};
///
/// let provider = |req: &RequestSnapshot| {
///     AuthzConfig::new(Endpoint::parts("pdp", 8181, "authz/allow"))
///         .enabled(req.method() == "GET")
/// };
///
/// assert!(provider.config_for(&RequestSnapshot::new("GET", "/")).enabled);
/// assert!(!provider.config_for(&RequestSnapshot::new("POST", "/")).enabled);
/// ```
pub trait ConfigProvider: Send + Sync {
    /// Returns the configuration for `request`.
    fn config_for(&self, request: &RequestSnapshot) -> AuthzConfig;
}

impl<F> ConfigProvider for F
where
    F: Fn(&RequestSnapshot) -> AuthzConfig + Send + Sync,
{
    fn config_for(&self, request: &RequestSnapshot) -> AuthzConfig {
        self(request)
    }
}

impl ConfigProvider for AuthzConfig {
    fn config_for(&self, _request: &RequestSnapshot) -> AuthzConfig {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let config = AuthzConfig::default();
        assert!(config.enabled);
        assert!(!config.allow_on_failure);
        assert!(config.include_body);
        assert!(config.include_headers);
        assert_eq!(config.timeout, Duration::from_millis(1000));
        assert!(config.enrich.is_empty());
        assert_eq!(config.enrich_target, EnrichTarget::Input);
        assert_eq!(config.response_shape, ResponseShape::Auto);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn empty_options_produce_defaults() {
        let config = AuthzOptions::from_json("{}").unwrap().into_config().unwrap();
        assert_eq!(config, AuthzConfig::default());
    }

    #[test]
    fn filter_and_enable_are_aliases_for_enabled() {
        let filter = AuthzOptions::from_json(r#"{"filter": false}"#).unwrap();
        assert_eq!(filter.enabled, Some(false));

        let enable = AuthzOptions::from_json(r#"{"enable": false}"#).unwrap();
        assert_eq!(enable.enabled, Some(false));
    }

    #[test]
    fn allow_on_fail_alias() {
        let options = AuthzOptions::from_json(r#"{"allowOnFail": true}"#).unwrap();
        assert!(options.into_config().unwrap().allow_on_failure);

        let options = AuthzOptions::from_json(r#"{"allowOnFailure": true}"#).unwrap();
        assert!(options.into_config().unwrap().allow_on_failure);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = AuthzOptions::from_json(r#"{"includeBdy": false}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }

    #[test]
    fn timeout_is_read_in_milliseconds() {
        let config = AuthzOptions::from_json(r#"{"timeout": 250}"#)
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.timeout, Duration::from_millis(250));
    }

    #[test]
    fn enrich_all_replaces_earlier_keys() {
        let mut extra = Map::new();
        extra.insert("tenant".to_string(), json!("acme"));
        extra.insert("serviceId".to_string(), json!(2));

        let config = AuthzConfig::default()
            .enrich("stale", true)
            .enrich_all(extra.clone())
            .enrich("region", "eu");

        assert!(config.enrich.get("stale").is_none());
        assert_eq!(config.enrich["tenant"], "acme");
        assert_eq!(config.enrich["serviceId"], 2);
        assert_eq!(config.enrich["region"], "eu");
        assert_eq!(config.enrich.len(), extra.len() + 1);
    }

    #[test]
    fn enrich_and_shape_options_are_read() {
        let config = AuthzOptions::from_json(
            r#"{"enrich": {"serviceId": 1}, "enrichTarget": "request", "responseShape": "allowObject"}"#,
        )
        .unwrap()
        .into_config()
        .unwrap();
        assert_eq!(config.enrich.get("serviceId"), Some(&json!(1)));
        assert_eq!(config.enrich_target, EnrichTarget::Request);
        assert_eq!(config.response_shape, ResponseShape::AllowObject);
    }

    #[test]
    fn hostname_without_port_uses_default_port() {
        let config = AuthzOptions::from_json(r#"{"hostname": "pdp", "policyPath": "a/b"}"#)
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.endpoint, Some(Endpoint::parts("pdp", 8181, "a/b")));
    }

    #[test]
    fn authz_server_is_used_verbatim() {
        let config = AuthzOptions::from_json(r#"{"authzServer": "http://authz.server"}"#)
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(
            config.endpoint,
            Some(Endpoint::Url("http://authz.server".to_string()))
        );
    }

    #[test]
    fn both_endpoint_forms_conflict() {
        let err = AuthzOptions::from_json(r#"{"authzServer": "http://a", "hostname": "b"}"#)
            .unwrap()
            .into_config()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }

    #[test]
    fn port_without_hostname_is_rejected() {
        let err = AuthzOptions::from_json(r#"{"port": 8181}"#)
            .unwrap()
            .into_config()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }

    #[test]
    fn missing_endpoint_fails_resolution() {
        let err = AuthzConfig::default().resolve_endpoint().unwrap_err();
        assert!(matches!(err, Error::MissingEndpoint));
    }

    #[test]
    fn closure_provider_sees_request() {
        let provider = |req: &RequestSnapshot| AuthzConfig::default().enabled(req.path() != "/health");
        assert!(!provider.config_for(&RequestSnapshot::new("GET", "/health")).enabled);
        assert!(provider.config_for(&RequestSnapshot::new("GET", "/users")).enabled);
    }

    #[test]
    fn static_config_is_a_provider() {
        let config = AuthzConfig::bypass();
        assert!(!config.config_for(&RequestSnapshot::new("GET", "/")).enabled);
    }
}
