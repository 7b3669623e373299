//! Generative-AI provider clients.
//!
//! Every provider sits behind the [`Provider`] trait and reports failures as a
//! [`ProviderError`] whose [`ProviderErrorKind`] drives the gateway's retry and
//! fallback decisions.

pub mod gemini;
pub mod huggingface;

pub use gemini::GeminiClient;
pub use huggingface::HuggingFaceClient;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use genio_core::GenerationRequest;

/// Suggested wait when a model is loading and the provider gave no hint.
pub const DEFAULT_LOADING_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Suggested wait when a model is missing or initializing.
pub const DEFAULT_UNAVAILABLE_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Negative prompt used for images when the caller gives none.
pub const DEFAULT_IMAGE_NEGATIVE_PROMPT: &str = "blurry, bad quality, distorted";

/// Frames per second of generated video.
pub const VIDEO_FPS: u32 = 24;

/// Longest blog completion requested from text models, in tokens.
const MAX_NEW_TOKENS: u32 = 500;

/// A provider-agnostic generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderRequest {
    /// Text completion.
    Text {
        /// Full prompt.
        prompt: String,
        /// Completion budget for models that take one.
        max_new_tokens: u32,
    },
    /// Text-to-image.
    Image {
        /// Prompt including style suffix.
        prompt: String,
        /// What to avoid.
        negative_prompt: String,
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// Text-to-audio.
    Audio {
        /// Text to voice.
        text: String,
    },
    /// Text-to-video.
    Video {
        /// Prompt.
        prompt: String,
        /// Number of frames at [`VIDEO_FPS`].
        num_frames: u32,
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
}

impl ProviderRequest {
    /// Build the provider call for a validated generation request.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_generation(request: &GenerationRequest) -> Self {
        match request {
            GenerationRequest::Text(req) => Self::Text {
                prompt: format!(
                    "Write a {length} blog post about {title}. Here are more details about the topic: {topic}. \n\
                     The tone should be {tone}.\n\n\
                     Please format the blog post in markdown with appropriate headings, paragraphs, \
                     and emphasis where needed. Make it engaging and well-structured.",
                    length = req.length,
                    title = req.title.trim(),
                    topic = req.topic_description.trim(),
                    tone = req.tone,
                ),
                max_new_tokens: (req.length.target_words() * 2).min(MAX_NEW_TOKENS),
            },
            GenerationRequest::Image(req) => Self::Image {
                prompt: format!("{}, {}", req.prompt.trim(), req.style.prompt_suffix()),
                negative_prompt: req
                    .negative_prompt
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(DEFAULT_IMAGE_NEGATIVE_PROMPT)
                    .to_string(),
                width: req.size.width,
                height: req.size.height,
            },
            GenerationRequest::Voice(req) => Self::Audio {
                text: req.text.trim().to_string(),
            },
            GenerationRequest::Video(req) => Self::Video {
                prompt: req.prompt.trim().to_string(),
                num_frames: (req.duration_seconds * f64::from(VIDEO_FPS)).round() as u32,
                width: 768,
                height: 512,
            },
        }
    }

    /// Short name of the request kind, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Audio { .. } => "audio",
            Self::Video { .. } => "video",
        }
    }
}

/// What a provider produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutput {
    /// Generated text.
    Text(String),
    /// Generated binary payload.
    Binary {
        /// Payload bytes.
        bytes: Bytes,
        /// MIME type reported by the provider.
        content_type: String,
    },
}

/// Normalized provider failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The model is loading; retry shortly.
    ModelLoading,
    /// The model is missing, initializing or rate limited; retry later.
    ModelUnavailable,
    /// Credentials were rejected. Never retried.
    AuthenticationFailure,
    /// The provider rejected the input. Never retried.
    InvalidInput,
    /// Timeouts, network errors and unexpected responses.
    Unknown,
}

impl ProviderErrorKind {
    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ModelLoading => "model_loading",
            Self::ModelUnavailable => "model_unavailable",
            Self::AuthenticationFailure => "authentication_failure",
            Self::InvalidInput => "invalid_input",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the gateway may try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelLoading | Self::ModelUnavailable | Self::Unknown)
    }

    /// Whether the caller should come back later rather than give up.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ModelLoading | Self::ModelUnavailable)
    }

    /// Client-facing status discriminator.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::ModelLoading => "loading",
            Self::ModelUnavailable => "initializing",
            Self::AuthenticationFailure | Self::InvalidInput | Self::Unknown => "error",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified provider failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    /// Failure class.
    pub kind: ProviderErrorKind,
    /// Suggested wait before trying again.
    pub retry_after: Option<Duration>,
    /// Provider detail, for logs.
    pub message: String,
}

impl ProviderError {
    /// Create an error of `kind`.
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retry_after: None,
            message: message.into(),
        }
    }

    /// The model is loading.
    pub fn model_loading(retry_after: Option<Duration>, message: impl Into<String>) -> Self {
        Self {
            retry_after: Some(retry_after.unwrap_or(DEFAULT_LOADING_RETRY_AFTER)),
            ..Self::new(ProviderErrorKind::ModelLoading, message)
        }
    }

    /// The model is missing or initializing.
    pub fn model_unavailable(retry_after: Option<Duration>, message: impl Into<String>) -> Self {
        Self {
            retry_after: Some(retry_after.unwrap_or(DEFAULT_UNAVAILABLE_RETRY_AFTER)),
            ..Self::new(ProviderErrorKind::ModelUnavailable, message)
        }
    }

    /// Credentials rejected.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::AuthenticationFailure, message)
    }

    /// Input rejected.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidInput, message)
    }

    /// Anything else.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unknown, message)
    }

    /// An attempt ran past its timeout.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::unknown(format!("no response after {}s", after.as_secs()))
    }

    /// Whether the gateway may try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self::unknown(e.to_string())
    }
}

/// A generative-AI backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    /// Run `request` on `model`.
    async fn invoke(
        &self,
        model: &str,
        request: &ProviderRequest,
    ) -> Result<ProviderOutput, ProviderError>;
}

/// Parse a `Retry-After` header given in whole seconds.
pub(crate) fn retry_after_header(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
