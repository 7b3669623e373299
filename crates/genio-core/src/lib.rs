//! Core types for Genio.
//!
//! This crate holds the domain model shared by the store and the service:
//!
//! - **Identifiers**: `UserId`, `TransactionId`, `GenerationId`
//! - **Users**: `User`, `ProfileUpdate`
//! - **Credits**: `CreditTransaction`, `TransactionType`
//! - **Requests**: `GenerationRequest` and its per-media variants
//! - **Records**: `GenerationRecord`, `ArtifactRef`
//! - **Pricing**: `PricingConfig`
//!
//! # Credits
//!
//! Credits are whole units stored as `i64`. Every generation costs at least
//! one credit and a balance never drops below zero.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod credits;
pub mod error;
pub mod generation;
pub mod ids;
pub mod pricing;
pub mod request;
pub mod user;

pub use credits::{CreditTransaction, TransactionType};
pub use error::{GenioError, Result};
pub use generation::{ArtifactRef, GenerationRecord, GenerationStatus};
pub use ids::{GenerationId, IdError, TransactionId, UserId};
pub use pricing::{PricingConfig, MINIMUM_CHARGE};
pub use request::{
    Emotion, GenerationRequest, ImageRequest, ImageSize, ImageStyle, Length, MediaType, Speed,
    TextRequest, Tone, VideoQuality, VideoRequest, Voice, VoiceRequest, DEFAULT_IMAGE_MODEL,
    MAX_IMAGE_SIDE, MAX_VIDEO_SECONDS, MIN_VIDEO_SECONDS,
};
pub use user::{ProfileUpdate, User, DEFAULT_SIGNUP_CREDITS};
