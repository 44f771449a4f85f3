use std::fmt;
use std::sync::Arc;

use crate::config::{AuthzConfig, ConfigProvider};
use crate::decision::{DecisionClient, DecisionFailure, DecisionRequest, HttpDecisionClient};
use crate::error::Error;
use crate::logging::GateLog;
use crate::query::build_query;
use crate::request::RequestSnapshot;

/// HTTP status of a rejected request.
pub const REJECTION_STATUS: u16 = 403;

/// Body of a rejected request.
pub const REJECTION_BODY: &str = "Unauthorized";

/// Terminal state of one request's trip through the gate.
///
/// Exactly one of pass-through or rejection follows from every outcome; see
/// [`Outcome::is_pass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Authorization was disabled for the request; the PDP was not contacted.
    Bypassed,
    /// The PDP allowed the request.
    Allowed,
    /// The PDP denied the request.
    Denied,
    /// The PDP call failed and `allow_on_failure` let the request through.
    FailedOpen(DecisionFailure),
    /// The PDP call failed and the request is rejected.
    FailedClosed(DecisionFailure),
}

impl Outcome {
    /// True when the next stage should run.
    pub fn is_pass(&self) -> bool {
        matches!(
            self,
            Outcome::Bypassed | Outcome::Allowed | Outcome::FailedOpen(_)
        )
    }

    /// The decision failure behind a fallback outcome, if any.
    pub fn failure(&self) -> Option<&DecisionFailure> {
        match self {
            Outcome::FailedOpen(failure) | Outcome::FailedClosed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Applies the failure policy to a decision result.
    fn from_decision(result: Result<bool, DecisionFailure>, allow_on_failure: bool) -> Self {
        match result {
            Ok(true) => Outcome::Allowed,
            Ok(false) => Outcome::Denied,
            Err(failure) if allow_on_failure => Outcome::FailedOpen(failure),
            Err(failure) => Outcome::FailedClosed(failure),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Bypassed => write!(f, "bypassed"),
            Outcome::Allowed => write!(f, "allowed"),
            Outcome::Denied => write!(f, "denied"),
            Outcome::FailedOpen(failure) => write!(f, "allowed on failure ({})", failure),
            Outcome::FailedClosed(failure) => write!(f, "denied on failure ({})", failure),
        }
    }
}

/// The authorization gate.
///
/// `AuthzGate` runs the decision pipeline for one request at a time:
/// configuration, bypass check, query construction, endpoint resolution,
/// the PDP round trip, and the failure policy. It holds no per-request state,
/// so one gate serves any number of concurrent requests.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use authz_gate::{
///     AuthzConfig, AuthzGate, DecisionClient, DecisionFailure, DecisionRequest, Endpoint,
///     Outcome, RequestSnapshot,
/// };
///
/// struct AllowAll;
///
/// #[async_trait]
/// impl DecisionClient for AllowAll {
///     async fn decide(&self, _request: &DecisionRequest) -> Result<bool, DecisionFailure> {
///         Ok(true)
///     }
/// }
///
/// # tokio_test(async {
/// let gate = AuthzGate::new(
///     |_req: &RequestSnapshot| AuthzConfig::new(Endpoint::parts("pdp", 8181, "authz/allow")),
///     AllowAll,
/// );
///
/// let outcome = gate.check(&RequestSnapshot::new("GET", "/")).await.unwrap();
/// assert_eq!(outcome, Outcome::Allowed);
/// # });
/// # fn tokio_test<F: std::future::Future>(f: F) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
/// # }
/// ```
pub struct AuthzGate<C = HttpDecisionClient> {
    provider: Arc<dyn ConfigProvider>,
    client: C,
}

impl AuthzGate<HttpDecisionClient> {
    /// Creates a gate that talks to the PDP over HTTP.
    ///
    /// # Errors
    ///
    /// [`Error::Client`] if the HTTP client cannot be constructed.
    pub fn http(provider: impl ConfigProvider + 'static) -> Result<Self, Error> {
        Ok(Self::new(provider, HttpDecisionClient::new()?))
    }
}

impl<C: DecisionClient> AuthzGate<C> {
    /// Creates a gate from a configuration provider and a decision client.
    pub fn new(provider: impl ConfigProvider + 'static, client: C) -> Self {
        Self {
            provider: Arc::new(provider),
            client,
        }
    }

    /// Computes the configuration for `snapshot`.
    pub fn config_for(&self, snapshot: &RequestSnapshot) -> AuthzConfig {
        self.provider.config_for(snapshot)
    }

    /// Runs the whole pipeline for `snapshot`, configuration included.
    ///
    /// # Errors
    ///
    /// Only configuration errors; see [`AuthzGate::authorize`].
    pub async fn check(&self, snapshot: &RequestSnapshot) -> Result<Outcome, Error> {
        let config = self.config_for(snapshot);
        self.authorize(snapshot, &config).await
    }

    /// Runs the pipeline for `snapshot` under an already computed `config`.
    ///
    /// A disabled config bypasses everything else. Otherwise the endpoint is
    /// resolved before any network activity, the query is built, and the
    /// decision client is called once; its failure is converted into a
    /// verdict using `allow_on_failure`.
    ///
    /// # Errors
    ///
    /// [`Error::MissingEndpoint`] or [`Error::InvalidEndpoint`] when the
    /// endpoint cannot be resolved. Transport failures are never errors.
    pub async fn authorize(
        &self,
        snapshot: &RequestSnapshot,
        config: &AuthzConfig,
    ) -> Result<Outcome, Error> {
        let log = GateLog::for_request(snapshot);

        if !config.enabled {
            log.debug(format_args!("authorization bypassed"));
            return Ok(Outcome::Bypassed);
        }

        let endpoint = config.resolve_endpoint().inspect_err(|e| {
            log.error(format_args!("authorization misconfigured: {}", e));
        })?;

        let request = DecisionRequest {
            endpoint,
            query: build_query(snapshot, config),
            timeout: config.timeout,
            response_shape: config.response_shape,
        };

        let outcome = Outcome::from_decision(
            self.client.decide(&request).await,
            config.allow_on_failure,
        );

        match &outcome {
            Outcome::Allowed => log.debug(format_args!("request allowed")),
            Outcome::Denied => log.info(format_args!("request denied by policy")),
            Outcome::FailedOpen(failure) | Outcome::FailedClosed(failure) => {
                log.warn(format_args!(
                    "decision failed ({}): {}; applying fallback verdict allow={}",
                    failure.kind(),
                    failure,
                    config.allow_on_failure
                ));
            }
            Outcome::Bypassed => {}
        }
        Ok(outcome)
    }
}

impl<C> fmt::Debug for AuthzGate<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthzGate").finish_non_exhaustive()
    }
}
