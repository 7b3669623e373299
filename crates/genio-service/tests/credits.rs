//! Credit balance, transaction and grant integration tests.

mod common;

use axum::http::{HeaderValue, StatusCode};
use common::{api_key_header, authorization, TestHarness};
use genio_core::UserId;
use serde_json::json;

// ============================================================================
// Balance
// ============================================================================

#[tokio::test]
async fn get_balance_success() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header(authorization(), harness.user_auth())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 100);
}

#[tokio::test]
async fn get_balance_without_account_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header(authorization(), harness.user_auth())
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn get_balance_without_auth_fails() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/credits/balance").await;

    response.assert_status_unauthorized();
}

// ============================================================================
// Transactions
// ============================================================================

#[tokio::test]
async fn list_transactions_paginates() {
    let harness = TestHarness::new();
    harness.create_account().await;

    for amount in [5, 7] {
        harness
            .server
            .post("/v1/credits/grant")
            .add_header(api_key_header(), harness.service_key())
            .json(&json!({
                "user_id": harness.test_user_id.to_string(),
                "amount": amount,
                "reason": "Promo"
            }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get("/v1/credits/transactions")
        .add_query_param("limit", 2)
        .add_header(authorization(), harness.user_auth())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(body["has_more"], true);

    let response = harness
        .server
        .get("/v1/credits/transactions")
        .add_query_param("limit", 2)
        .add_query_param("offset", 2)
        .add_header(authorization(), harness.user_auth())
        .await;

    let body: serde_json::Value = response.json();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_more"], false);
}

#[tokio::test]
async fn list_transactions_without_account_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/credits/transactions")
        .add_header(authorization(), harness.user_auth())
        .await;

    response.assert_status_not_found();
}

// ============================================================================
// Grants
// ============================================================================

#[tokio::test]
async fn grant_credits_tops_up_balance() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header(api_key_header(), harness.service_key())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": 250,
            "reason": "Monthly plan"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 350);
    assert_eq!(body["transaction"]["transaction_type"], "grant");
    assert_eq!(body["transaction"]["description"], "Monthly plan");
    assert_eq!(harness.balance().await, 350);
}

#[tokio::test]
async fn grant_credits_requires_service_key() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let body = json!({
        "user_id": harness.test_user_id.to_string(),
        "amount": 250,
        "reason": "Monthly plan"
    });

    harness
        .server
        .post("/v1/credits/grant")
        .json(&body)
        .await
        .assert_status_unauthorized();

    harness
        .server
        .post("/v1/credits/grant")
        .add_header(api_key_header(), HeaderValue::from_static("wrong-key"))
        .json(&body)
        .await
        .assert_status_unauthorized();

    // A user session is not a service credential.
    harness
        .server
        .post("/v1/credits/grant")
        .add_header(authorization(), harness.user_auth())
        .json(&body)
        .await
        .assert_status_unauthorized();

    assert_eq!(harness.balance().await, 100);
}

#[tokio::test]
async fn grant_credits_rejects_non_positive_amount() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header(api_key_header(), harness.service_key())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": 0,
            "reason": "Nothing"
        }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn grant_past_max_balance_is_refused() {
    let harness = TestHarness::new();
    harness.create_account().await;

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header(api_key_header(), harness.service_key())
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "amount": i64::MAX,
            "reason": "Too much"
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);

    // The store keeps serving this and other users.
    assert_eq!(harness.balance().await, 100);
    harness
        .server
        .post("/v1/generate/text")
        .add_header(authorization(), harness.user_auth())
        .json(&json!({ "title": "Rust", "topic_description": "Traits" }))
        .await
        .assert_status_ok();
    assert_eq!(harness.balance().await, 88);
}

#[tokio::test]
async fn grant_credits_to_unknown_user_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header(api_key_header(), harness.service_key())
        .json(&json!({
            "user_id": UserId::generate().to_string(),
            "amount": 10,
            "reason": "Promo"
        }))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn grant_credits_rejects_malformed_user_id() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header(api_key_header(), harness.service_key())
        .json(&json!({ "user_id": "nope", "amount": 10, "reason": "Promo" }))
        .await;

    response.assert_status_bad_request();
}
