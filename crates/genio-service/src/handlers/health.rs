//! Health check handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use genio_core::MediaType;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Media types that can currently be generated.
    pub available_media: Vec<MediaType>,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let available_media = MediaType::ALL
        .iter()
        .copied()
        .filter(|m| state.orchestrator.is_available(*m))
        .collect();

    Json(HealthResponse {
        status: "ok".to_string(),
        service: "genio".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        available_media,
    })
}
