//! Genio HTTP API service.
//!
//! This crate provides credit-metered AI generation over HTTP:
//!
//! - Accounts with a prepaid credit balance
//! - Text, image, voice and video generation through external providers
//! - Per-media generation history
//!
//! # Authentication
//!
//! 1. **Session JWTs** (HS256) - for end-user requests
//! 2. **Service API keys** - for service-to-service credit grants
//!
//! # Generation flow
//!
//! Every request is validated and priced, then paid for up front through the
//! [`ledger::Ledger`]. The [`gateway::ProviderGateway`] calls the provider
//! with retries and fallback, binary output is uploaded to the
//! [`artifacts::ArtifactStore`], and the record is persisted. Any failure after
//! the debit refunds it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)]

pub mod artifacts;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod ledger;
pub mod orchestrator;
pub mod providers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use gateway::{ProviderGateway, RetryPolicy, Route, Target};
pub use ledger::{Ledger, Reservation};
pub use orchestrator::{GenerationError, GenerationOutcome, Orchestrator};
pub use routes::create_router;
pub use state::AppState;
