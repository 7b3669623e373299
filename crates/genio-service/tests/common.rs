//! Common test utilities for genio integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;
use bytes::Bytes;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use genio_core::{MediaType, UserId};
use genio_service::artifacts::{ArtifactStore, UploadError};
use genio_service::auth::JwtClaims;
use genio_service::providers::{
    Provider, ProviderError, ProviderErrorKind, ProviderOutput, ProviderRequest,
};
use genio_service::{
    create_router, AppState, ProviderGateway, RetryPolicy, Route, ServiceConfig, Target,
};
use genio_store::MemoryStore;

pub const JWT_SECRET: &str = "test-secret";
pub const SERVICE_API_KEY: &str = "test-service-key";
pub const GENERATED_TEXT: &str = "# A generated post\n\nHello.";

pub fn authorization() -> HeaderName {
    HeaderName::from_static("authorization")
}

pub fn api_key_header() -> HeaderName {
    HeaderName::from_static("x-api-key")
}

/// Provider that answers every request, or fails with a fixed kind.
pub struct StubProvider {
    failure: Option<ProviderErrorKind>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn invoke(
        &self,
        _model: &str,
        request: &ProviderRequest,
    ) -> Result<ProviderOutput, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.failure {
            let retry_after = kind.is_transient().then(|| Duration::from_secs(20));
            return Err(ProviderError {
                kind,
                retry_after,
                message: "stub failure".into(),
            });
        }
        Ok(match request {
            ProviderRequest::Text { .. } => ProviderOutput::Text(GENERATED_TEXT.into()),
            ProviderRequest::Image { .. } => ProviderOutput::Binary {
                bytes: Bytes::from_static(b"\x89PNG"),
                content_type: "image/png".into(),
            },
            ProviderRequest::Audio { .. } => ProviderOutput::Binary {
                bytes: Bytes::from_static(b"fLaC"),
                content_type: "audio/flac".into(),
            },
            ProviderRequest::Video { .. } => ProviderOutput::Binary {
                bytes: Bytes::from_static(b"\x00\x00\x00\x18ftypmp42"),
                content_type: "video/mp4".into(),
            },
        })
    }
}

/// Artifact store that hands out sequential CDN URLs.
#[derive(Default)]
pub struct StubArtifacts {
    uploads: AtomicUsize,
}

#[async_trait]
impl ArtifactStore for StubArtifacts {
    async fn store(
        &self,
        _bytes: Bytes,
        _content_type: &str,
        media: MediaType,
    ) -> Result<String, UploadError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("https://cdn.test/{media}/{n}"))
    }
}

/// Options for [`TestHarness`].
pub struct HarnessBuilder {
    signup_credits: i64,
    failure: Option<ProviderErrorKind>,
    binary_media: bool,
}

impl HarnessBuilder {
    pub fn signup_credits(mut self, credits: i64) -> Self {
        self.signup_credits = credits;
        self
    }

    pub fn provider_failure(mut self, kind: ProviderErrorKind) -> Self {
        self.failure = Some(kind);
        self
    }

    /// Route text only and run without an artifact store.
    pub fn text_only(mut self) -> Self {
        self.binary_media = false;
        self
    }

    pub fn build(self) -> TestHarness {
        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            jwt_secret: Some(JWT_SECRET.into()),
            service_api_key: Some(SERVICE_API_KEY.into()),
            signup_credits: self.signup_credits,
            ..ServiceConfig::default()
        };

        let provider = Arc::new(StubProvider {
            failure: self.failure,
            calls: AtomicUsize::new(0),
        });
        let route = |media: MediaType| Route {
            primary: Target::new(provider.clone(), format!("stub-{media}")),
            fallback: None,
            timeout: Duration::from_secs(30),
        };

        let mut gateway = ProviderGateway::new(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            fallback_attempts: 1,
        })
        .with_route(MediaType::Text, route(MediaType::Text));

        let artifacts: Option<Arc<dyn ArtifactStore>> = if self.binary_media {
            for media in [MediaType::Image, MediaType::Voice, MediaType::Video] {
                gateway = gateway.with_route(media, route(media));
            }
            Some(Arc::new(StubArtifacts::default()))
        } else {
            None
        };

        let state = AppState::from_parts(Arc::new(MemoryStore::new()), config, gateway, artifacts);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        TestHarness {
            server,
            provider,
            test_user_id: UserId::generate(),
        }
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The provider behind every route.
    pub provider: Arc<StubProvider>,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
}

impl TestHarness {
    /// A harness with every media type routed and 100 signup credits.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            signup_credits: 100,
            failure: None,
            binary_media: true,
        }
    }

    /// Authorization header value for the test user.
    pub fn user_auth(&self) -> HeaderValue {
        bearer_for(self.test_user_id)
    }

    /// The service API key header value.
    pub fn service_key(&self) -> HeaderValue {
        HeaderValue::from_static(SERVICE_API_KEY)
    }

    /// Create the test user's account and return the response body.
    pub async fn create_account(&self) -> serde_json::Value {
        let response = self
            .server
            .post("/v1/accounts")
            .add_header(authorization(), self.user_auth())
            .json(&serde_json::json!({}))
            .await;
        response.assert_status_ok();
        response.json()
    }

    pub async fn balance(&self) -> i64 {
        let response = self
            .server
            .get("/v1/credits/balance")
            .add_header(authorization(), self.user_auth())
            .await;
        response.assert_status_ok();
        response.json::<serde_json::Value>()["credits"]
            .as_i64()
            .expect("credits is a number")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A session token for `user_id`, signed with the test secret.
pub fn token_for(user_id: UserId) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = JwtClaims {
        sub: user_id.to_string(),
        email: Some(format!("{user_id}@example.com")),
        aud: "genio-api".into(),
        iss: "genio".into(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}

pub fn bearer_for(user_id: UserId) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token_for(user_id))).expect("valid header value")
}
