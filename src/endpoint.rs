//! Decision endpoint resolution.
//!
//! Resolution is pure: no DNS, no connection, same input same URL. Malformed
//! descriptors are deployment mistakes and fail here, before any network call.

use url::Url;

use crate::error::Error;

/// Path prefix of the PDP's data/policy query API.
pub const API_ROOT: &str = "/v1/data";

/// Scheme assumed when the hostname does not carry one.
///
/// This is plain HTTP; a deployment that needs TLS must say `https://`
/// explicitly. The resolver never upgrades on its own.
pub const DEFAULT_SCHEME: &str = "http";

/// Resolves a hostname, port and policy path into the decision URL.
///
/// # Errors
///
/// Returns [`Error::InvalidEndpoint`] when the hostname is empty, uses a
/// scheme other than `http`/`https`, already carries a port, path or query,
/// or contains backslashes, whitespace or control characters. The policy path
/// is rejected when empty, when it contains a query, fragment, backslash or
/// control character, or when any segment is `.` or `..` (also percent-encoded),
/// so the resulting URL always stays under [`API_ROOT`].
///
/// # Examples
///
/// ```
/// use authz_gate::endpoint::resolve;
///
/// let a = resolve("authz.server", 8181, "policy/path").unwrap();
/// let b = resolve("http://authz.server", 8181, "/policy/path").unwrap();
///
/// assert_eq!(a.as_str(), "http://authz.server:8181/v1/data/policy/path");
/// assert_eq!(a, b);
/// ```
pub fn resolve(hostname: &str, port: u16, policy_path: &str) -> Result<Url, Error> {
    let descriptor = || format!("{hostname}:{port} {policy_path}");

    let host = hostname.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(Error::invalid_endpoint(descriptor(), "hostname is empty"));
    }

    let (scheme, authority) = match host.split_once("://") {
        Some((scheme, authority)) => (scheme.to_ascii_lowercase(), authority),
        None => (DEFAULT_SCHEME.to_string(), host),
    };
    check_scheme(&scheme).map_err(|reason| Error::invalid_endpoint(descriptor(), reason))?;

    if authority.is_empty() {
        return Err(Error::invalid_endpoint(descriptor(), "hostname is empty"));
    }
    if authority.chars().any(is_forbidden_in_host) {
        return Err(Error::invalid_endpoint(
            descriptor(),
            "hostname must be a bare host, without path, query, credentials or whitespace",
        ));
    }
    if carries_port(authority) {
        return Err(Error::invalid_endpoint(
            descriptor(),
            "hostname already carries a port",
        ));
    }
    if port == 0 {
        return Err(Error::invalid_endpoint(descriptor(), "port 0 is not routable"));
    }

    let path = normalize_policy_path(policy_path)
        .map_err(|reason| Error::invalid_endpoint(descriptor(), reason))?;

    let raw = format!("{scheme}://{authority}:{port}{API_ROOT}{path}");
    let url = Url::parse(&raw).map_err(|e| Error::invalid_endpoint(descriptor(), e.to_string()))?;

    // The parser may normalize; the result must still be the URL we assembled.
    let under_root = url
        .path()
        .strip_prefix(API_ROOT)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| !rest.is_empty());
    if !under_root {
        return Err(Error::invalid_endpoint(
            descriptor(),
            "policy path escapes the data API root",
        ));
    }
    if url.port_or_known_default() != Some(port) {
        return Err(Error::invalid_endpoint(
            descriptor(),
            "hostname changes the decision port",
        ));
    }
    Ok(url)
}

/// Validates a complete decision URL supplied as is.
///
/// # Errors
///
/// Returns [`Error::InvalidEndpoint`] when the URL does not parse, is not
/// `http`/`https`, or has no host.
pub fn resolve_url(raw: &str) -> Result<Url, Error> {
    let url = Url::parse(raw.trim()).map_err(|e| Error::invalid_endpoint(raw, e.to_string()))?;
    check_scheme(url.scheme()).map_err(|reason| Error::invalid_endpoint(raw, reason))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::invalid_endpoint(raw, "URL has no host"));
    }
    Ok(url)
}

/// Normalizes a policy path to exactly one leading `/`.
fn normalize_policy_path(policy_path: &str) -> Result<String, String> {
    let trimmed = policy_path.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return Err("policy path is empty".to_string());
    }
    if trimmed.contains(['?', '#']) {
        return Err("policy path must not contain a query or fragment".to_string());
    }
    if trimmed.contains('\\') || trimmed.chars().any(|c| c.is_control()) {
        return Err("policy path must not contain backslashes or control characters".to_string());
    }
    if trimmed.split('/').any(is_dot_segment) {
        return Err("policy path must not contain '.' or '..' segments".to_string());
    }
    Ok(format!("/{trimmed}"))
}

/// True for `.` and `..`, literal or with `%2e` in place of the dots.
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

fn is_forbidden_in_host(c: char) -> bool {
    matches!(c, '/' | '\\' | '?' | '#' | '@') || c.is_whitespace() || c.is_control()
}

fn check_scheme(scheme: &str) -> Result<(), String> {
    match scheme {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{other}'")),
    }
}

/// True when `authority` already ends in `:port` (IPv6 literals are bracketed).
fn carries_port(authority: &str) -> bool {
    match authority.strip_prefix('[') {
        Some(rest) => rest
            .split_once(']')
            .map_or(false, |(_, after)| !after.is_empty()),
        None => authority.contains(':'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_without_scheme_to_http() {
        let url = resolve("authz.server", 8181, "/policy/path").unwrap();
        assert_eq!(url.as_str(), "http://authz.server:8181/v1/data/policy/path");
    }

    #[test]
    fn keeps_https_scheme() {
        let url = resolve("https://authz.server", 8181, "/policy/path").unwrap();
        assert_eq!(url.as_str(), "https://authz.server:8181/v1/data/policy/path");
    }

    #[test]
    fn adds_missing_leading_slash() {
        let url = resolve("authz.server", 8181, "policy/path").unwrap();
        assert_eq!(url.path(), "/v1/data/policy/path");
    }

    #[test]
    fn collapses_repeated_leading_slashes() {
        let url = resolve("authz.server", 8181, "///policy/path").unwrap();
        assert_eq!(url.path(), "/v1/data/policy/path");
    }

    #[test]
    fn tolerates_trailing_slash_on_hostname() {
        let url = resolve("http://localhost/", 8181, "authz/allow").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8181/v1/data/authz/allow");
    }

    #[test]
    fn accepts_ipv6_literal() {
        let url = resolve("[::1]", 8181, "authz").unwrap();
        assert_eq!(url.as_str(), "http://[::1]:8181/v1/data/authz");
    }

    #[test]
    fn rejects_empty_hostname() {
        assert!(matches!(
            resolve("", 8181, "a"),
            Err(Error::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            resolve("http://", 8181, "a"),
            Err(Error::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let err = resolve("ftp://authz.server", 8181, "a").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme 'ftp'"));
    }

    #[test]
    fn rejects_hostname_with_port() {
        let err = resolve("authz.server:9000", 8181, "a").unwrap_err();
        assert!(err.to_string().contains("already carries a port"));

        let err = resolve("[::1]:9000", 8181, "a").unwrap_err();
        assert!(err.to_string().contains("already carries a port"));
    }

    #[test]
    fn rejects_hostname_with_path() {
        assert!(resolve("http://authz.server/prefix", 8181, "a").is_err());
    }

    #[test]
    fn rejects_empty_policy_path() {
        let err = resolve("authz.server", 8181, "/").unwrap_err();
        assert!(err.to_string().contains("policy path is empty"));
    }

    #[test]
    fn rejects_policy_path_with_query() {
        assert!(resolve("authz.server", 8181, "a?b=c").is_err());
    }

    #[test]
    fn rejects_port_zero() {
        assert!(resolve("authz.server", 0, "a").is_err());
    }

    #[test]
    fn default_port_is_normalized_away() {
        let url = resolve("pdp", 80, "authz/allow").unwrap();
        assert_eq!(url.as_str(), "http://pdp/v1/data/authz/allow");
        assert_eq!(url.port_or_known_default(), Some(80));

        let url = resolve("https://pdp", 443, "authz/allow").unwrap();
        assert_eq!(url.as_str(), "https://pdp/v1/data/authz/allow");
    }

    #[test]
    fn rejects_dot_segments_in_policy_path() {
        for path in [
            "../../v1/policies/x",
            "authz/../allow",
            "authz/./allow",
            "apps/%2e%2e/%2e%2e/%2e%2e/admin",
            "apps/%2E%2E/admin",
            "apps/.%2e/admin",
            "apps/%2e",
        ] {
            let err = resolve("pdp", 8181, path).unwrap_err();
            assert!(
                err.to_string().contains("'.' or '..' segments"),
                "{path}: {err}"
            );
        }
    }

    #[test]
    fn dotted_names_are_not_dot_segments() {
        let url = resolve("pdp", 8181, "v1.2/..allow/a..b").unwrap();
        assert_eq!(url.path(), "/v1/data/v1.2/..allow/a..b");
    }

    #[test]
    fn rejects_backslash_and_control_in_policy_path() {
        assert!(resolve("pdp", 8181, "authz\\..\\admin").is_err());
        assert!(resolve("pdp", 8181, "authz/al\tlow").is_err());
        assert!(resolve("pdp", 8181, "authz/al\nlow").is_err());
    }

    #[test]
    fn rejects_backslash_whitespace_and_control_in_hostname() {
        for host in ["evil.example\\x", "evil example", "evil.example\tx", "evil\u{0}x"] {
            assert!(
                matches!(resolve(host, 8181, "authz/allow"), Err(Error::InvalidEndpoint { .. })),
                "{host:?}"
            );
        }
    }

    #[test]
    fn resolved_url_keeps_port_and_root() {
        let url = resolve("pdp", 8181, "authz/allow").unwrap();
        assert_eq!(url.port_or_known_default(), Some(8181));
        assert!(url.path().starts_with("/v1/data/"));
    }

    #[test]
    fn resolve_url_accepts_complete_url() {
        let url = resolve_url("http://authz.server").unwrap();
        assert_eq!(url.host_str(), Some("authz.server"));
    }

    #[test]
    fn resolve_url_rejects_garbage() {
        assert!(resolve_url("not a url").is_err());
        assert!(resolve_url("mailto:ops@example.com").is_err());
    }
}
