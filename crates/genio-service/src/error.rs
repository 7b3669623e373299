//! API error types and responses.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use genio_core::GenioError;
use genio_store::StoreError;

use crate::orchestrator::GenerationError;
use crate::providers::ProviderError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Bad request - invalid input.
    #[error("{0}")]
    Validation(String),

    /// The authenticated principal has no user row.
    #[error("user not found")]
    UserNotFound,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Conflict - resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Insufficient credits.
    #[error("insufficient credits: required={required}, available={available}")]
    InsufficientCredits {
        /// Price of the request.
        required: i64,
        /// Current balance.
        available: i64,
    },

    /// Provider is loading or initializing; retry later.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(ProviderError),

    /// Provider failed permanently.
    #[error("provider error: {0}")]
    Provider(ProviderError),

    /// A required dependency is not configured.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Artifact upload failed.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// Generation record could not be persisted.
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    /// Generation exceeded its deadline.
    #[error("generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// A refund failed; the user is charged for nothing.
    #[error("ledger inconsistency: {0}")]
    LedgerInconsistency(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
                None,
            ),
            Self::UserNotFound => (
                StatusCode::NOT_FOUND,
                "user_not_found",
                "User not found".to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientCredits {
                required,
                available,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                self.to_string(),
                Some(serde_json::json!({
                    "required": required,
                    "available": available
                })),
            ),
            Self::ProviderUnavailable(err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "provider_unavailable",
                match err.kind.status() {
                    "loading" => "Model is loading, please try again shortly".to_string(),
                    _ => "Model is initializing, please try again later".to_string(),
                },
                Some(serde_json::json!({
                    "kind": err.kind.as_str(),
                    "status": err.kind.status(),
                    "retry_after": err.retry_after.map(|d| d.as_secs())
                })),
            ),
            Self::Provider(err) => (
                StatusCode::BAD_GATEWAY,
                "provider_error",
                "The generation provider failed".to_string(),
                Some(serde_json::json!({
                    "kind": err.kind.as_str(),
                    "status": err.kind.status()
                })),
            ),
            Self::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
                None,
            ),
            Self::UploadFailed(msg) => {
                tracing::error!(error = %msg, "Artifact upload failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "upload_failed",
                    "Failed to store the generated artifact".to_string(),
                    None,
                )
            }
            Self::PersistenceFailed(msg) => {
                tracing::error!(error = %msg, "Generation persistence failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence_failed",
                    "Failed to save the generation".to_string(),
                    None,
                )
            }
            Self::Timeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                self.to_string(),
                None,
            ),
            Self::LedgerInconsistency(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ledger_inconsistency",
                "Your credits could not be refunded; support has been notified".to_string(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity: "user", .. } => Self::UserNotFound,
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::AlreadyExists(what) => Self::Conflict(what),
            StoreError::InsufficientCredits {
                required,
                available,
            } => Self::InsufficientCredits {
                required,
                available,
            },
            err @ StoreError::BalanceOverflow { .. } => Self::Conflict(err.to_string()),
            StoreError::InvalidAmount(amount) => {
                Self::Validation(format!("amount must be positive, got {amount}"))
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<GenioError> for ApiError {
    fn from(err: GenioError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Validation(e) => e.into(),
            GenerationError::Unavailable(media) => {
                Self::ServiceUnavailable(format!("{media} generation is not configured"))
            }
            GenerationError::UserNotFound(_) => Self::UserNotFound,
            GenerationError::InsufficientCredits {
                required,
                available,
            } => Self::InsufficientCredits {
                required,
                available,
            },
            GenerationError::Provider(e) if e.kind.is_transient() => Self::ProviderUnavailable(e),
            GenerationError::Provider(e) => Self::Provider(e),
            GenerationError::UploadFailure(msg) => Self::UploadFailed(msg),
            GenerationError::PersistenceFailure(msg) => Self::PersistenceFailed(msg),
            GenerationError::Timeout(after) => Self::Timeout(after),
            err @ GenerationError::LedgerInconsistency { .. } => {
                Self::LedgerInconsistency(err.to_string())
            }
            GenerationError::Internal(msg) => Self::Internal(msg),
        }
    }
}
