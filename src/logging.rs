use std::fmt;

use crate::request::RequestSnapshot;

/// Request-bound structured logger used by the gate.
///
/// Every event carries the request's method and path so decisions can be
/// correlated in logs. Bodies and header values are never logged.
///
/// ```no_run
/// # use authz_gate::{GateLog, RequestSnapshot};
/// let snapshot = RequestSnapshot::new("GET", "/users/42");
/// let log = GateLog::for_request(&snapshot);
/// log.info(format_args!("decision denied"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct GateLog<'a> {
    method: &'a str,
    path: &'a str,
}

impl<'a> GateLog<'a> {
    /// Creates a logger bound to `snapshot`.
    pub fn for_request(snapshot: &'a RequestSnapshot) -> Self {
        Self {
            method: snapshot.method(),
            path: snapshot.path(),
        }
    }

    /// Returns the method this logger is bound to.
    pub fn method(&self) -> &str {
        self.method
    }

    /// Returns the path this logger is bound to.
    pub fn path(&self) -> &str {
        self.path
    }

    /// Logs an info-level message.
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(method = %self.method, path = %self.path, "{}", args);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(method = %self.method, path = %self.path, "{}", args);
    }

    /// Logs an error-level message.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(method = %self.method, path = %self.path, "{}", args);
    }

    /// Logs a debug-level message.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(method = %self.method, path = %self.path, "{}", args);
    }
}
