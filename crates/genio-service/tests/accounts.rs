//! Account management integration tests.

mod common;

use axum::http::{HeaderValue, StatusCode};
use common::{authorization, TestHarness};
use serde_json::json;

// ============================================================================
// Account Creation
// ============================================================================

#[tokio::test]
async fn create_account_grants_signup_credits() {
    let harness = TestHarness::new();

    let body = harness.create_account().await;

    assert_eq!(body["user_id"], harness.test_user_id.to_string());
    assert_eq!(body["credits"], 100);
    assert_eq!(body["email"], format!("{}@example.com", harness.test_user_id));
    assert_eq!(body["name"], harness.test_user_id.to_string());
}

#[tokio::test]
async fn create_account_records_signup_grant() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let response = harness
        .server
        .get("/v1/credits/transactions")
        .add_header(authorization(), harness.user_auth())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["transaction_type"], "grant");
    assert_eq!(transactions[0]["amount"], 100);
    assert_eq!(transactions[0]["balance_after"], 100);
}

#[tokio::test]
async fn create_account_uses_body_fields() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/accounts")
        .add_header(authorization(), harness.user_auth())
        .json(&json!({
            "email": "Ada@Example.com",
            "name": "Ada Lovelace",
            "profile_picture": "https://img.test/ada.png"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["name"], "Ada Lovelace");
    assert_eq!(body["profile_picture"], "https://img.test/ada.png");
    assert_eq!(body["verified"], false);
}

#[tokio::test]
async fn create_account_rejects_invalid_email() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/accounts")
        .add_header(authorization(), harness.user_auth())
        .json(&json!({ "email": "not-an-email" }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn create_account_without_auth_fails() {
    let harness = TestHarness::new();

    let response = harness.server.post("/v1/accounts").json(&json!({})).await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn create_account_with_garbage_token_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/accounts")
        .add_header(authorization(), HeaderValue::from_static("Bearer not-a-jwt"))
        .json(&json!({}))
        .await;

    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn create_account_duplicate_fails() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let response = harness
        .server
        .post("/v1/accounts")
        .add_header(authorization(), harness.user_auth())
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    // The duplicate attempt must not grant signup credits twice.
    assert_eq!(harness.balance().await, 100);
}

// ============================================================================
// Get Account
// ============================================================================

#[tokio::test]
async fn get_account_success() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let response = harness
        .server
        .get("/v1/accounts/me")
        .add_header(authorization(), harness.user_auth())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["user_id"], harness.test_user_id.to_string());
    assert_eq!(body["credits"], 100);
}

#[tokio::test]
async fn get_nonexistent_account_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/accounts/me")
        .add_header(authorization(), harness.user_auth())
        .await;

    response.assert_status_not_found();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "user_not_found");
}

#[tokio::test]
async fn get_account_without_auth_fails() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/accounts/me").await;

    response.assert_status_unauthorized();
}

// ============================================================================
// Update Profile
// ============================================================================

#[tokio::test]
async fn update_profile_changes_name_only() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let response = harness
        .server
        .patch("/v1/accounts/me")
        .add_header(authorization(), harness.user_auth())
        .json(&json!({ "name": "Grace" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], "Grace");
    assert_eq!(body["credits"], 100);
    assert_eq!(body["email"], format!("{}@example.com", harness.test_user_id));
}

#[tokio::test]
async fn update_profile_rejects_empty_name() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let response = harness
        .server
        .patch("/v1/accounts/me")
        .add_header(authorization(), harness.user_auth())
        .json(&json!({ "name": "   " }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn update_profile_without_account_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .patch("/v1/accounts/me")
        .add_header(authorization(), harness.user_auth())
        .json(&json!({ "name": "Grace" }))
        .await;

    response.assert_status_not_found();
}
