use thiserror::Error;

/// Configuration errors raised by the authorization gate.
///
/// These are the only failures that cross the gate boundary. Transport and
/// PDP failures are absorbed into a verdict (see [`DecisionFailure`](crate::DecisionFailure)).
#[derive(Debug, Error)]
pub enum Error {
    /// The request is subject to authorization but no endpoint was configured.
    #[error("no decision endpoint configured")]
    MissingEndpoint,

    /// The endpoint descriptor could not be turned into an absolute URL.
    #[error("invalid decision endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The offending descriptor, as written by the caller
        endpoint: String,
        /// Why it was rejected
        reason: String,
    },

    /// Raw options were inconsistent or unrecognized.
    #[error("invalid authorization options: {0}")]
    InvalidOptions(String),

    /// The outbound HTTP client could not be constructed.
    #[error("failed to build decision client: {0}")]
    Client(String),
}

impl Error {
    pub(crate) fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}
