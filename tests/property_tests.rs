//! Property tests for endpoint resolution and query construction.

use authz_gate::endpoint::resolve;
use authz_gate::{build_query, AuthzConfig, EnrichTarget, RequestSnapshot};
use proptest::prelude::*;
use serde_json::Value;

// Strategy: DNS-style hostnames
fn arb_hostname() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,10}(\\.[a-z][a-z0-9]{0,6}){0,2}").unwrap()
}

// Strategy: policy paths made of slash-separated segments, no leading slash
fn arb_policy_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9_]{0,8}", 1..4).prop_map(|segments| segments.join("/"))
}

fn arb_method() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("GET"),
        Just("POST"),
        Just("PUT"),
        Just("PATCH"),
        Just("DELETE"),
    ]
}

proptest! {
    /// Property: resolution is deterministic and lands under the data API.
    #[test]
    fn proptest_resolve_is_deterministic(
        host in arb_hostname(),
        port in 1u16..,
        policy in arb_policy_path(),
    ) {
        let first = resolve(&host, port, &policy).unwrap();
        let second = resolve(&host, port, &policy).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.path(), format!("/v1/data/{}", policy));
        prop_assert_eq!(first.scheme(), "http");
    }

    /// Property: a leading slash and an explicit http scheme change nothing.
    #[test]
    fn proptest_resolve_normalizes_slash_and_scheme(
        host in arb_hostname(),
        port in 1u16..,
        policy in arb_policy_path(),
    ) {
        let bare = resolve(&host, port, &policy).unwrap();
        let slashed = resolve(&host, port, &format!("/{}", policy)).unwrap();
        let schemed = resolve(&format!("http://{}", host), port, &policy).unwrap();

        prop_assert_eq!(&bare, &slashed);
        prop_assert_eq!(&bare, &schemed);
    }

    /// Property: a hostname that already carries a port is always rejected.
    #[test]
    fn proptest_resolve_rejects_embedded_port(
        host in arb_hostname(),
        embedded in 1u16..,
        port in 1u16..,
        policy in arb_policy_path(),
    ) {
        let hostname = format!("{}:{}", host, embedded);
        prop_assert!(resolve(&hostname, port, &policy).is_err());
    }

    /// Property: a `.`/`..` segment anywhere in the policy path, literal or
    /// percent-encoded, is rejected instead of being collapsed.
    #[test]
    fn proptest_resolve_rejects_dot_segments(
        host in arb_hostname(),
        port in 1u16..,
        before in prop::collection::vec("[a-z][a-z0-9_]{0,8}", 0..3),
        after in prop::collection::vec("[a-z][a-z0-9_]{0,8}", 0..3),
        dots in prop_oneof![
            Just("."), Just(".."), Just("%2e"), Just("%2E"),
            Just("%2e%2e"), Just("%2E%2e"), Just(".%2e"), Just("%2e."),
        ],
    ) {
        let mut segments = before;
        segments.push(dots.to_string());
        segments.extend(after);
        let policy = segments.join("/");

        prop_assert!(resolve(&host, port, &policy).is_err(), "accepted {}", policy);
    }

    /// Property: backslashes, whitespace and control characters in the
    /// hostname are rejected, never re-split into host and path.
    #[test]
    fn proptest_resolve_rejects_unsafe_hostname_chars(
        head in arb_hostname(),
        tail in "[a-z]{1,6}",
        bad in prop_oneof![Just('\\'), Just(' '), Just('\t'), Just('\n'), Just('\u{0}'), Just('\u{7f}')],
        port in 1u16..,
        policy in arb_policy_path(),
    ) {
        let hostname = format!("{}{}{}", head, bad, tail);
        prop_assert!(resolve(&hostname, port, &policy).is_err());
    }

    /// Property: every accepted URL keeps the requested port and stays under
    /// the data API root.
    #[test]
    fn proptest_resolved_url_keeps_port_and_root(
        host in arb_hostname(),
        port in 1u16..,
        policy in arb_policy_path(),
    ) {
        let url = resolve(&host, port, &policy).unwrap();
        prop_assert_eq!(url.port_or_known_default(), Some(port));
        prop_assert!(url.path().starts_with("/v1/data/"));
    }

    /// Property: body and headers appear exactly when their flags say so,
    /// while method, path and query are always present.
    #[test]
    fn proptest_include_flags_control_presence(
        method in arb_method(),
        include_body in any::<bool>(),
        include_headers in any::<bool>(),
        header_value in "[a-z0-9]{1,12}",
    ) {
        let snapshot = RequestSnapshot::new(method, "/items")
            .with_header("x-trace", header_value)
            .with_raw_body(b"{\"k\":1}");
        let config = AuthzConfig::default()
            .include_body(include_body)
            .include_headers(include_headers);

        let doc = build_query(&snapshot, &config).to_value();
        let request = &doc["input"]["request"];

        prop_assert_eq!(&request["method"], method);
        prop_assert_eq!(&request["path"], "/items");
        prop_assert!(request.get("query").is_some());
        prop_assert_eq!(request.get("body").is_some(), include_body);
        prop_assert_eq!(request.get("headers").is_some(), include_headers);
    }

    /// Property: enrichment overrides computed keys of the same name and
    /// adds the rest verbatim.
    #[test]
    fn proptest_enrichment_is_merged_last(
        key in prop_oneof![Just("request".to_string()), Just("resources".to_string()), "[a-z]{1,8}"],
        value in any::<i64>(),
        into_request in any::<bool>(),
    ) {
        let target = if into_request { EnrichTarget::Request } else { EnrichTarget::Input };
        let config = AuthzConfig::default()
            .enrich(key.clone(), value)
            .enrich_target(target);

        let doc = build_query(&RequestSnapshot::new("GET", "/"), &config).to_value();

        let merged = match target {
            EnrichTarget::Input => &doc["input"],
            EnrichTarget::Request => &doc["input"]["request"],
        };
        prop_assert_eq!(&merged[key.as_str()], &Value::from(value));
    }
}
