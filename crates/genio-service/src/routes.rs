//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, credits, generate, health, history};
use crate::state::AppState;

/// Maximum concurrent generation requests. Each one holds a provider call.
const GENERATE_MAX_CONCURRENT_REQUESTS: usize = 20;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Accounts (JWT auth)
/// - `POST /v1/accounts` - Create account with signup credits
/// - `GET /v1/accounts/me` - Profile and balance
/// - `PATCH /v1/accounts/me` - Update name or profile picture
///
/// ## Credits
/// - `GET /v1/credits/balance` - Current balance (JWT)
/// - `GET /v1/credits/transactions` - Ledger history (JWT)
/// - `POST /v1/credits/grant` - Top up a user (service API key)
///
/// ## Generation (JWT auth, concurrency-limited)
/// - `POST /v1/generate/{text,image,voice,video}`
/// - `GET /v1/generations/:media` - History, newest first
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    let generate_routes = Router::new()
        .route("/text", post(generate::generate_text))
        .route("/image", post(generate::generate_image))
        .route("/voice", post(generate::generate_voice))
        .route("/video", post(generate::generate_video))
        .layer(ConcurrencyLimitLayer::new(GENERATE_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Accounts
        .route("/accounts", post(accounts::create_account))
        .route(
            "/accounts/me",
            get(accounts::get_account).patch(accounts::update_account),
        )
        // Credits
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/transactions", get(credits::list_transactions))
        .route("/credits/grant", post(credits::grant_credits))
        // History
        .route("/generations/:media", get(history::list_generations))
        .nest("/generate", generate_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
