//! Generation history handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use genio_core::{ArtifactRef, GenerationRecord, GenerationRequest, GenerationStatus, MediaType};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// One history entry.
#[derive(Debug, Serialize)]
pub struct GenerationItem {
    /// Record ID.
    pub id: String,
    /// Media type.
    pub media_type: MediaType,
    /// The request, with all per-media options.
    pub request: GenerationRequest,
    /// Where the output lives.
    pub artifact: ArtifactRef,
    /// Credits charged.
    pub credit_cost: i64,
    /// Lifecycle state.
    pub status: GenerationStatus,
    /// Timestamp.
    pub created_at: String,
}

impl From<GenerationRecord> for GenerationItem {
    fn from(record: GenerationRecord) -> Self {
        Self {
            id: record.id.to_string(),
            media_type: record.media_type(),
            request: record.request,
            artifact: record.artifact,
            credit_cost: record.credit_cost,
            status: record.status,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// History response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Records, newest first.
    pub generations: Vec<GenerationItem>,
}

/// List the current user's generations of one media type.
pub async fn list_generations(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(media): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let media: MediaType = media.parse()?;

    state
        .store
        .get_user(&auth.user_id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let generations = state
        .store
        .list_generations(&auth.user_id, media)
        .await?
        .into_iter()
        .map(GenerationItem::from)
        .collect();

    Ok(Json(HistoryResponse { generations }))
}
