//! Service configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use genio_core::{PricingConfig, DEFAULT_SIGNUP_CREDITS};

use crate::gateway::RetryPolicy;

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default Hugging Face inference API base URL.
pub const DEFAULT_HUGGINGFACE_BASE_URL: &str = "https://api-inference.huggingface.co";

/// Default Cloudinary API base URL.
pub const DEFAULT_CLOUDINARY_BASE_URL: &str = "https://api.cloudinary.com";

/// Cloudinary upload credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudinaryConfig {
    /// Cloud name (first path segment of the upload URL).
    pub cloud_name: String,
    /// API key.
    pub api_key: String,
    /// API secret used to sign uploads.
    pub api_secret: String,
}

/// Per-media provider attempt timeouts.
#[derive(Debug, Clone, Copy)]
pub struct ProviderTimeouts {
    /// Text generation.
    pub text: Duration,
    /// Image generation.
    pub image: Duration,
    /// Audio and video generation.
    pub media: Duration,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self {
            text: Duration::from_secs(30),
            image: Duration::from_secs(60),
            media: Duration::from_secs(120),
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/genio").
    pub data_dir: String,

    /// PostgreSQL URL. When set, PostgreSQL is used instead of `RocksDB`.
    pub database_url: Option<String>,

    /// PostgreSQL pool size (default: 10).
    pub database_max_connections: u32,

    /// HS256 secret for session JWTs.
    pub jwt_secret: Option<String>,

    /// Expected JWT issuer.
    pub jwt_issuer: String,

    /// Expected JWT audience.
    pub jwt_audience: String,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Gemini API key (optional).
    pub gemini_api_key: Option<String>,

    /// Gemini API base URL.
    pub gemini_base_url: String,

    /// Hugging Face API token (optional).
    pub huggingface_api_key: Option<String>,

    /// Hugging Face inference API base URL.
    pub huggingface_base_url: String,

    /// Cloudinary credentials (optional).
    pub cloudinary: Option<CloudinaryConfig>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds. Must exceed the generation deadline.
    pub request_timeout_seconds: u64,

    /// Overall deadline for one generation run, in seconds.
    pub generation_deadline_seconds: u64,

    /// Credits granted to a new account.
    pub signup_credits: i64,

    /// Provider retry policy.
    pub retry: RetryPolicy,

    /// Provider attempt timeouts.
    pub provider_timeouts: ProviderTimeouts,

    /// Pricing configuration.
    pub pricing: PricingConfig,
}

/// Provider secrets file structure.
#[derive(Debug, Default, Deserialize)]
struct ProviderSecrets {
    #[serde(default)]
    jwt_secret: Option<String>,
    #[serde(default)]
    gemini_api_key: Option<String>,
    #[serde(default)]
    huggingface_api_key: Option<String>,
    #[serde(default)]
    cloudinary: Option<CloudinaryConfig>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and the secrets file.
    #[must_use]
    pub fn from_env() -> Self {
        let secrets = load_provider_secrets();
        let defaults = Self::default();

        let cloudinary = secrets.cloudinary.or_else(|| {
            Some(CloudinaryConfig {
                cloud_name: env("CLOUDINARY_CLOUD_NAME")?,
                api_key: env("CLOUDINARY_API_KEY")?,
                api_secret: env("CLOUDINARY_API_SECRET")?,
            })
        });

        let retry = RetryPolicy {
            max_attempts: env_parse("RETRY_MAX_ATTEMPTS").unwrap_or(defaults.retry.max_attempts),
            base_delay: env_parse("RETRY_BASE_DELAY_SECONDS")
                .map_or(defaults.retry.base_delay, Duration::from_secs),
            fallback_attempts: env_parse("RETRY_FALLBACK_ATTEMPTS")
                .unwrap_or(defaults.retry.fallback_attempts),
        };

        Self {
            listen_addr: env("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: env("DATA_DIR").unwrap_or(defaults.data_dir),
            database_url: env("DATABASE_URL"),
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            jwt_secret: secrets.jwt_secret.or_else(|| env("JWT_SECRET")),
            jwt_issuer: env("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            jwt_audience: env("JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            service_api_key: env("SERVICE_API_KEY"),
            gemini_api_key: secrets.gemini_api_key.or_else(|| env("GEMINI_API_KEY")),
            gemini_base_url: env("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            huggingface_api_key: secrets
                .huggingface_api_key
                .or_else(|| env("HUGGINGFACE_API_KEY")),
            huggingface_base_url: env("HUGGINGFACE_BASE_URL")
                .unwrap_or(defaults.huggingface_base_url),
            cloudinary,
            cors_origins: env("CORS_ORIGINS")
                .unwrap_or_else(|| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            generation_deadline_seconds: env_parse("GENERATION_DEADLINE_SECONDS")
                .unwrap_or(defaults.generation_deadline_seconds),
            signup_credits: env_parse("SIGNUP_CREDITS").unwrap_or(defaults.signup_credits),
            retry,
            provider_timeouts: defaults.provider_timeouts,
            pricing: defaults.pricing,
        }
    }

    /// Overall deadline for one generation run.
    #[must_use]
    pub const fn generation_deadline(&self) -> Duration {
        Duration::from_secs(self.generation_deadline_seconds)
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env(name).and_then(|s| s.parse().ok())
}

/// Load provider secrets from file, if one exists.
fn load_provider_secrets() -> ProviderSecrets {
    let secret_paths = [
        ".secrets/providers.json",
        "genio/.secrets/providers.json",
        "../.secrets/providers.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<ProviderSecrets>(path) {
            tracing::info!(path = %path, "Loaded provider secrets from file");
            return secrets;
        }
    }

    tracing::debug!("Provider secrets file not found, using environment variables");
    ProviderSecrets::default()
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/genio".into(),
            database_url: None,
            database_max_connections: 10,
            jwt_secret: None,
            jwt_issuer: "genio".into(),
            jwt_audience: "genio-api".into(),
            service_api_key: None,
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.into(),
            huggingface_api_key: None,
            huggingface_base_url: DEFAULT_HUGGINGFACE_BASE_URL.into(),
            cloudinary: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 330,
            generation_deadline_seconds: 300,
            signup_credits: DEFAULT_SIGNUP_CREDITS,
            retry: RetryPolicy::default(),
            provider_timeouts: ProviderTimeouts::default(),
            pricing: PricingConfig::default(),
        }
    }
}
