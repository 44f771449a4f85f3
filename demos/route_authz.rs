//! Route authorization demonstration.
//!
//! This example wires the authorization layer into an axum router:
//! 1. Start a toy PDP that allows reads of user 42 only
//! 2. Protect GET routes, let everything else bypass the PDP
//! 3. Declare per-route permissions and enrich every query
//! 4. Send a few requests and print the outcome
//!
//! Run with: `cargo run --example route_authz`

use std::net::SocketAddr;

use authz_gate::web::{permissions, AuthzLayer};
use authz_gate::{AuthzConfig, Endpoint, RequestSnapshot};
use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Toy policy: allow when the route's `user_id` is 42 and the route declared
/// `user.read`.
async fn toy_policy(Json(query): Json<Value>) -> Json<Value> {
    let input = &query["input"];
    let user = &input["resources"]["attributes"]["user_id"];
    let declared = input["resources"]["permissions"]
        .as_array()
        .is_some_and(|list| list.iter().any(|p| p == "user.read"));

    println!("  PDP saw: {}", input);
    Json(json!({"result": {"allow": user == "42" && declared}}))
}

async fn start_pdp() -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let pdp = Router::new().route("/v1/data/httpapi/authz/allow", post(toy_policy));
    tokio::spawn(async move { axum::serve(listener, pdp).await });
    Ok(addr)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Route Authorization Example ===\n");

    let pdp = start_pdp().await?;
    println!("Toy PDP listening on {}\n", pdp);

    // Only reads go through the PDP; every query carries the service id.
    let authz = AuthzLayer::http(move |req: &RequestSnapshot| {
        AuthzConfig::new(Endpoint::parts(pdp.ip().to_string(), pdp.port(), "httpapi/authz/allow"))
            .enabled(req.method() == "GET")
            .include_headers(false)
            .enrich("serviceId", 1)
    })?;

    let app = Router::new().route(
        "/users/{user_id}",
        get(|| async { "user profile" })
            .post(|| async { "user updated" })
            .route_layer(authz)
            .route_layer(permissions(["user.read"])),
    );

    for (method, uri) in [("GET", "/users/42"), ("GET", "/users/7"), ("POST", "/users/7")] {
        println!("--- {} {} ---", method, uri);
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())?;
        let response = app.clone().oneshot(request).await?;
        println!("  → {}\n", response.status());
    }

    println!("=== Example Complete ===");
    Ok(())
}
