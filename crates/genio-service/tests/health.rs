//! Health endpoint integration tests.

mod common;

use common::TestHarness;

#[tokio::test]
async fn health_check_returns_ok() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "genio");
}

#[tokio::test]
async fn health_lists_every_routed_media() {
    let harness = TestHarness::new();

    let body: serde_json::Value = harness.server.get("/health").await.json();

    assert_eq!(
        body["available_media"],
        serde_json::json!(["text", "image", "voice", "video"])
    );
}

#[tokio::test]
async fn health_omits_media_without_artifact_storage() {
    let harness = TestHarness::builder().text_only().build();

    let body: serde_json::Value = harness.server.get("/health").await.json();

    assert_eq!(body["available_media"], serde_json::json!(["text"]));
}
