//! Smoke tests against a running API server.
//!
//! These tests require:
//! - The API server running (`cargo run -p shopfloor-api`)
//! - `SHOPFLOOR_SESSION_SECRET` matching the server's, to mint session tokens
//! - No `INNGEST_SIGNING_KEY` on the server, so test users can be created
//!   through the lifecycle webhook
//!
//! Run with: cargo test -p shopfloor-integration-tests --test api_smoke -- --ignored

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use shopfloor_api::services::SessionVerifier;
use shopfloor_core::ExternalUserId;
use uuid::Uuid;

/// Base URL for the API (configurable via environment).
fn base_url() -> String {
    let _ = dotenvy::dotenv();
    std::env::var("SHOPFLOOR_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

fn client() -> Client {
    Client::builder()
        .build()
        .expect("Failed to create HTTP client")
}

/// Mint a bearer token the server will accept for `subject`.
fn token_for(subject: &ExternalUserId) -> String {
    let secret = std::env::var("SHOPFLOOR_SESSION_SECRET")
        .expect("SHOPFLOOR_SESSION_SECRET must match the server's");
    SessionVerifier::new(SecretString::from(secret))
        .issue(subject, Duration::minutes(10), Utc::now())
        .expect("Failed to issue token")
}

/// Create a user through the lifecycle webhook and return its subject id.
async fn create_user(client: &Client) -> ExternalUserId {
    let id = format!("user_smoke_{}", Uuid::new_v4().simple());
    let resp = client
        .post(format!("{}/api/inngest", base_url()))
        .json(&json!({
            "event": {
                "name": "webhook-integration/user.created",
                "data": {
                    "id": id,
                    "email_addresses": [{ "email_address": format!("{id}@shopfloor.test") }],
                    "first_name": "Smoke",
                    "last_name": "Test"
                }
            }
        }))
        .send()
        .await
        .expect("Failed to send lifecycle event");

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "synced");
    ExternalUserId::parse(&id).unwrap()
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_health_endpoints() {
    let client = client();

    let resp = client
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = client
        .get(format!("{}/health/ready", base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_orders_require_session() {
    let resp = client()
        .get(format!("{}/api/orders", base_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Unauthorized");
}

#[tokio::test]
#[ignore = "Requires running API server and a matching session secret"]
async fn test_new_user_flow() {
    let client = client();
    let subject = create_user(&client).await;
    let token = token_for(&subject);

    let resp = client
        .get(format!("{}/api/orders", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["orders"], json!([]));

    let resp = client
        .post(format!("{}/api/users/addresses", base_url()))
        .bearer_auth(&token)
        .json(&json!({
            "label": "Home",
            "fullName": "Smoke Test",
            "streetAddress": "1 Test Way",
            "city": "Portland",
            "state": "OR",
            "zipCode": "97201",
            "isDefault": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .get(format!("{}/api/admin/stats", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .post(format!("{}/api/inngest", base_url()))
        .json(&json!({
            "name": "webhook-integration/user.deleted",
            "data": { "id": subject.as_str() }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{}/api/orders", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
