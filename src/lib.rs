//! HTTP authorization gate backed by a remote policy decision point (PDP).
//!
//! For every incoming request the gate computes a per-request configuration,
//! builds a JSON query document describing the request, POSTs it to the PDP,
//! and turns the answer into a verdict:
//!
//! - **allowed**: the request continues to its handler
//! - **denied**: the request is answered with `403 Unauthorized`
//! - **no answer** (timeout, transport error, bad response): the configured
//!   `allow_on_failure` fallback decides
//!
//! # Core Types
//!
//! - [`AuthzConfig`]: per-request settings, produced by a [`ConfigProvider`]
//! - [`RequestSnapshot`]: framework-neutral view of the incoming request
//! - [`AuthzQuery`]: the `{"input": ...}` document sent to the PDP
//! - [`DecisionClient`]: one POST, one verdict ([`HttpDecisionClient`] over HTTP)
//! - [`AuthzGate`]: ties the pieces together and yields an [`Outcome`]
//! - [`web::AuthzLayer`]: tower middleware for axum routers
//!
//! # Examples
//!
//! ```
//! use authz_gate::{build_query, AuthzConfig, Endpoint, RequestSnapshot};
//!
//! let config = AuthzConfig::new(Endpoint::parts("localhost", 8181, "httpapi/authz/allow"))
//!     .enrich("serviceId", 1);
//! assert_eq!(
//!     config.resolve_endpoint().unwrap().as_str(),
//!     "http://localhost:8181/v1/data/httpapi/authz/allow"
//! );
//!
//! let snapshot = RequestSnapshot::new("get", "/users/42").with_route_param("user_id", "42");
//! let query = build_query(&snapshot, &config);
//! assert_eq!(query.request().unwrap()["method"], "GET");
//! assert_eq!(query.input()["resources"]["attributes"]["user_id"], "42");
//! assert_eq!(query.input()["serviceId"], 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod decision;
pub mod endpoint;
mod error;
mod gate;
mod logging;
mod query;
mod request;
pub mod web;

pub use config::{
    AuthzConfig, AuthzOptions, ConfigProvider, Endpoint, EnrichTarget, ResponseShape,
    DEFAULT_PDP_PORT, DEFAULT_TIMEOUT,
};
pub use decision::{
    parse_verdict, DecisionClient, DecisionFailure, DecisionRequest, HttpDecisionClient,
};
pub use error::Error;
pub use gate::{AuthzGate, Outcome, REJECTION_BODY, REJECTION_STATUS};
pub use logging::GateLog;
pub use query::{build_query, AuthzQuery};
pub use request::{PeerAddr, Permissions, RequestSnapshot};
