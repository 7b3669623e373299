//! Generation handlers, one per media type.
//!
//! Bodies carry enumerated options as plain strings so unknown values surface
//! as `validation_error` responses rather than JSON rejections.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use genio_core::{
    ArtifactRef, Emotion, GenerationRecord, GenerationRequest, ImageRequest, ImageSize,
    ImageStyle, Length, MediaType, Speed, TextRequest, Tone, VideoQuality, VideoRequest, Voice,
    VoiceRequest, DEFAULT_IMAGE_MODEL, MAX_VIDEO_SECONDS,
};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::orchestrator::GenerationOutcome;
use crate::state::AppState;

/// Result of a completed generation.
#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    /// Generation record ID.
    pub id: String,
    /// Media type produced.
    pub media_type: MediaType,
    /// Generated text, for text requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Artifact URL, for binary media.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Artifact MIME type, for binary media.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Credits charged.
    pub credit_cost: i64,
    /// Balance after the charge.
    pub credits_remaining: i64,
    /// Timestamp.
    pub created_at: String,
}

impl GenerationResponse {
    fn new(record: &GenerationRecord, credits_remaining: i64) -> Self {
        let (content, url, content_type) = match &record.artifact {
            ArtifactRef::Inline { content } => (Some(content.clone()), None, None),
            ArtifactRef::Url { url, content_type } => {
                (None, Some(url.clone()), Some(content_type.clone()))
            }
        };
        Self {
            id: record.id.to_string(),
            media_type: record.media_type(),
            content,
            url,
            content_type,
            credit_cost: record.credit_cost,
            credits_remaining,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

impl From<GenerationOutcome> for GenerationResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self::new(&outcome.record, outcome.balance)
    }
}

/// Parse an optional wire value, falling back to `default` when absent.
fn option_or<T>(value: Option<String>, default: T) -> Result<T, ApiError>
where
    T: FromStr<Err = genio_core::GenioError>,
{
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => Ok(raw.parse()?),
    }
}

async fn run(
    state: &AppState,
    auth: &AuthUser,
    request: GenerationRequest,
) -> Result<Json<GenerationResponse>, ApiError> {
    let outcome = state.orchestrator.generate(auth.user_id, request).await?;
    Ok(Json(outcome.into()))
}

/// Blog generation request.
#[derive(Debug, Deserialize)]
pub struct TextBody {
    /// Post title.
    #[serde(default)]
    pub title: String,
    /// What the post should cover.
    #[serde(default, alias = "topicDescription")]
    pub topic_description: String,
    /// Tone (default: professional).
    #[serde(default)]
    pub tone: Option<String>,
    /// Length (default: medium).
    #[serde(default)]
    pub length: Option<String>,
}

/// Generate a markdown blog post.
pub async fn generate_text(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<TextBody>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let request = GenerationRequest::Text(TextRequest {
        title: body.title,
        topic_description: body.topic_description,
        tone: option_or(body.tone, Tone::Professional)?,
        length: option_or(body.length, Length::Medium)?,
    });
    run(&state, &auth, request).await
}

/// Image generation request.
#[derive(Debug, Deserialize)]
pub struct ImageBody {
    /// What to draw.
    #[serde(default)]
    pub prompt: String,
    /// What to avoid.
    #[serde(default, alias = "negativePrompt")]
    pub negative_prompt: Option<String>,
    /// `"WxH"` (default: 1024x1024).
    #[serde(default)]
    pub size: Option<String>,
    /// Style (default: natural).
    #[serde(default)]
    pub style: Option<String>,
    /// Model id (default: Stable Diffusion XL).
    #[serde(default)]
    pub model: Option<String>,
}

/// Generate an image.
pub async fn generate_image(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<ImageBody>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let request = GenerationRequest::Image(ImageRequest {
        prompt: body.prompt,
        negative_prompt: body.negative_prompt,
        size: option_or(
            body.size,
            ImageSize {
                width: 1024,
                height: 1024,
            },
        )?,
        style: option_or(body.style, ImageStyle::Natural)?,
        model: body
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
    });
    run(&state, &auth, request).await
}

/// Voice generation request.
#[derive(Debug, Deserialize)]
pub struct VoiceBody {
    /// Text to voice.
    #[serde(default)]
    pub text: String,
    /// Voice style (default: natural).
    #[serde(default)]
    pub voice: Option<String>,
    /// Emotion (default: neutral).
    #[serde(default)]
    pub emotion: Option<String>,
    /// Speed (default: medium).
    #[serde(default)]
    pub speed: Option<String>,
}

/// Generate audio.
pub async fn generate_voice(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<VoiceBody>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let request = GenerationRequest::Voice(VoiceRequest {
        text: body.text,
        voice: option_or(body.voice, Voice::Natural)?,
        emotion: option_or(body.emotion, Emotion::Neutral)?,
        speed: option_or(body.speed, Speed::Medium)?,
    });
    run(&state, &auth, request).await
}

/// Video generation request.
#[derive(Debug, Deserialize)]
pub struct VideoBody {
    /// What to film.
    #[serde(default)]
    pub prompt: String,
    /// Clip length in seconds (default: 4).
    #[serde(default, alias = "duration")]
    pub duration_seconds: Option<f64>,
    /// Quality (default: 720p).
    #[serde(default)]
    pub quality: Option<String>,
    /// Free-form style hint.
    #[serde(default)]
    pub style: Option<String>,
}

/// Generate a short video.
pub async fn generate_video(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<VideoBody>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let request = GenerationRequest::Video(VideoRequest {
        prompt: body.prompt,
        duration_seconds: body.duration_seconds.unwrap_or(MAX_VIDEO_SECONDS),
        quality: option_or(body.quality, VideoQuality::Hd)?,
        style: body.style.filter(|s| !s.trim().is_empty()),
    });
    run(&state, &auth, request).await
}
