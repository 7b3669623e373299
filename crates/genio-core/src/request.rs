//! Typed generation requests.
//!
//! A [`GenerationRequest`] is the per-media strategy record of the
//! orchestrator: its variant decides how the request is validated, priced,
//! sent to a provider and stored. The enumerated options parse from their
//! wire names and reject anything else with `InvalidParameter`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GenioError, Result};

/// Largest accepted image side in pixels.
pub const MAX_IMAGE_SIDE: u32 = 2048;

/// Shortest video the video model can produce, in seconds.
pub const MIN_VIDEO_SECONDS: f64 = 2.0;

/// Longest video the video model can produce, in seconds.
pub const MAX_VIDEO_SECONDS: f64 = 4.0;

/// Image model used when the request does not name one.
pub const DEFAULT_IMAGE_MODEL: &str = "stabilityai/stable-diffusion-xl-base-1.0";

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant ),+ ];

            /// The wire name of this variant.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                }
            }
        }

        impl FromStr for $name {
            type Err = GenioError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $( $wire => Ok(Self::$variant), )+
                    other => Err(GenioError::invalid_parameter(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// The kind of artifact a generation produces.
    MediaType {
        /// Markdown blog post, stored inline.
        Text => "text",
        /// Still image.
        Image => "image",
        /// Spoken or generated audio.
        Voice => "voice",
        /// Short video clip.
        Video => "video",
    }
);

impl MediaType {
    /// Whether the artifact is binary and must go through the artifact store.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        !matches!(self, Self::Text)
    }
}

wire_enum!(
    /// Blog tone.
    Tone {
        /// Professional.
        Professional => "professional",
        /// Casual.
        Casual => "casual",
        /// Formal.
        Formal => "formal",
        /// Friendly.
        Friendly => "friendly",
    }
);

wire_enum!(
    /// Blog length.
    Length {
        /// Roughly 300 words.
        Short => "short",
        /// Roughly 600 words.
        Medium => "medium",
        /// Roughly 1000 words.
        Long => "long",
        /// Caller-described length.
        Custom => "custom",
    }
);

impl Length {
    /// Approximate target word count.
    #[must_use]
    pub const fn target_words(&self) -> u32 {
        match self {
            Self::Short => 300,
            Self::Medium => 600,
            Self::Long | Self::Custom => 1000,
        }
    }
}

wire_enum!(
    /// Image style, appended to the prompt.
    ImageStyle {
        /// Photorealistic.
        Natural => "natural",
        /// Stylized.
        Artistic => "artistic",
        /// Anime / manga.
        Anime => "anime",
        /// Abstract.
        Abstract => "abstract",
        /// Film still.
        Cinematic => "cinematic",
        /// 3D render.
        ThreeD => "3d",
    }
);

impl ImageStyle {
    /// Prompt suffix describing the style to the model.
    #[must_use]
    pub const fn prompt_suffix(&self) -> &'static str {
        match self {
            Self::Natural => "realistic, high-quality, photorealistic",
            Self::Artistic => "artistic, creative, stylized",
            Self::Anime => "anime style, manga-inspired",
            Self::Abstract => "abstract, non-representational, conceptual",
            Self::Cinematic => "cinematic, dramatic lighting, movie scene",
            Self::ThreeD => "3D rendered, volumetric lighting, octane render",
        }
    }
}

wire_enum!(
    /// Video output quality.
    VideoQuality {
        /// 1280x720.
        Hd => "720p",
        /// 1920x1080.
        FullHd => "1080p",
        /// 3840x2160.
        Uhd => "4k",
    }
);

wire_enum!(
    /// Voice style.
    Voice {
        /// Natural.
        Natural => "natural",
        /// Professional narrator.
        Professional => "professional",
        /// Casual.
        Casual => "casual",
        /// News anchor.
        News => "news",
    }
);

wire_enum!(
    /// Voice emotion.
    Emotion {
        /// Neutral.
        Neutral => "neutral",
        /// Happy.
        Happy => "happy",
        /// Sad.
        Sad => "sad",
        /// Excited.
        Excited => "excited",
        /// Calm.
        Calm => "calm",
    }
);

wire_enum!(
    /// Voice speed.
    Speed {
        /// Slow.
        Slow => "slow",
        /// Medium.
        Medium => "medium",
        /// Fast.
        Fast => "fast",
    }
);

/// Image dimensions parsed from a `"WxH"` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageSize {
    /// Pixel area.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl FromStr for ImageSize {
    type Err = GenioError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || GenioError::invalid_parameter(format!("invalid image size '{s}'"));
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl TryFrom<String> for ImageSize {
    type Error = GenioError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ImageSize> for String {
    fn from(size: ImageSize) -> Self {
        size.to_string()
    }
}

/// Blog post request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRequest {
    /// Post title.
    pub title: String,
    /// What the post should cover.
    pub topic_description: String,
    /// Tone of voice.
    pub tone: Tone,
    /// Target length.
    pub length: Length,
}

/// Image request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// What to draw.
    pub prompt: String,
    /// What to avoid.
    pub negative_prompt: Option<String>,
    /// Output dimensions.
    pub size: ImageSize,
    /// Visual style.
    pub style: ImageStyle,
    /// Provider model id; selects the per-model base cost.
    pub model: String,
}

/// Audio request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceRequest {
    /// Text to voice.
    pub text: String,
    /// Voice style.
    pub voice: Voice,
    /// Emotion.
    pub emotion: Emotion,
    /// Speed.
    pub speed: Speed,
}

impl VoiceRequest {
    /// Number of whitespace separated words in the text.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Video request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRequest {
    /// What to film.
    pub prompt: String,
    /// Clip length in seconds.
    pub duration_seconds: f64,
    /// Output quality.
    pub quality: VideoQuality,
    /// Free-form style hint kept with the record.
    pub style: Option<String>,
}

/// A generation request of any media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "media_type", rename_all = "lowercase")]
pub enum GenerationRequest {
    /// Blog post.
    Text(TextRequest),
    /// Image.
    Image(ImageRequest),
    /// Audio.
    Voice(VoiceRequest),
    /// Video.
    Video(VideoRequest),
}

impl GenerationRequest {
    /// The media type this request produces.
    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::Text(_) => MediaType::Text,
            Self::Image(_) => MediaType::Image,
            Self::Voice(_) => MediaType::Voice,
            Self::Video(_) => MediaType::Video,
        }
    }

    /// Check required fields and numeric ranges.
    ///
    /// # Errors
    ///
    /// Returns [`GenioError::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Text(req) => {
                require(&req.title, "title")?;
                require(&req.topic_description, "topic description")
            }
            Self::Image(req) => {
                require(&req.prompt, "prompt")?;
                require(&req.model, "model")?;
                if req.size.width > MAX_IMAGE_SIDE || req.size.height > MAX_IMAGE_SIDE {
                    return Err(GenioError::validation(format!(
                        "image sides must not exceed {MAX_IMAGE_SIDE} pixels"
                    )));
                }
                Ok(())
            }
            Self::Voice(req) => require(&req.text, "text"),
            Self::Video(req) => {
                require(&req.prompt, "prompt")?;
                let d = req.duration_seconds;
                if !d.is_finite() || !(MIN_VIDEO_SECONDS..=MAX_VIDEO_SECONDS).contains(&d) {
                    return Err(GenioError::validation(format!(
                        "duration must be between {MIN_VIDEO_SECONDS} and {MAX_VIDEO_SECONDS} seconds"
                    )));
                }
                Ok(())
            }
        }
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GenioError::validation(format!("{field} is required")));
    }
    Ok(())
}
