//! Pricing engine.
//!
//! Maps a [`GenerationRequest`] to an integer credit cost. Prices are pure
//! functions of the request and the [`PricingConfig`] tables; every charge is
//! at least one credit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GenioError, Result};
use crate::request::{
    Emotion, GenerationRequest, ImageRequest, Length, Speed, TextRequest, Tone, VideoQuality,
    Voice, VoiceRequest, DEFAULT_IMAGE_MODEL,
};

/// Pixel area billed as one image unit (512 x 512).
pub const IMAGE_UNIT_AREA: f64 = 512.0 * 512.0;

/// Seconds of video billed as one block.
pub const VIDEO_BLOCK_SECONDS: f64 = 5.0;

/// Credits per block of video before the quality weight.
pub const VIDEO_BLOCK_CREDITS: f64 = 10.0;

/// Words of voice text billed as one unit.
pub const VOICE_WORDS_PER_UNIT: usize = 50;

/// Minimum charge for any generation.
pub const MINIMUM_CHARGE: i64 = 1;

// Absorbs binary float error so that 16.5 stays 16.5 and 10.0 does not ceil to 11.
const EPSILON: f64 = 1e-9;

/// Pricing tables for every media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Text base credits by length.
    pub length_weights: HashMap<Length, f64>,

    /// Text multiplier by tone.
    pub tone_weights: HashMap<Tone, f64>,

    /// Image credits per 512x512 unit, by model id.
    pub image_base_costs: HashMap<String, f64>,

    /// Video multiplier by quality.
    pub quality_weights: HashMap<VideoQuality, f64>,

    /// Voice multiplier by voice style.
    pub voice_weights: HashMap<Voice, f64>,

    /// Voice multiplier by emotion.
    pub emotion_weights: HashMap<Emotion, f64>,

    /// Voice multiplier by speed.
    pub speed_weights: HashMap<Speed, f64>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            length_weights: HashMap::from([
                (Length::Short, 5.0),
                (Length::Medium, 10.0),
                (Length::Long, 15.0),
                (Length::Custom, 20.0),
            ]),
            tone_weights: HashMap::from([
                (Tone::Professional, 1.2),
                (Tone::Casual, 1.0),
                (Tone::Formal, 1.3),
                (Tone::Friendly, 1.1),
            ]),
            image_base_costs: HashMap::from([(DEFAULT_IMAGE_MODEL.to_string(), 1.0)]),
            quality_weights: HashMap::from([
                (VideoQuality::Hd, 1.0),
                (VideoQuality::FullHd, 1.5),
                (VideoQuality::Uhd, 2.5),
            ]),
            voice_weights: HashMap::from([
                (Voice::Natural, 1.0),
                (Voice::Professional, 1.5),
                (Voice::Casual, 1.2),
                (Voice::News, 1.4),
            ]),
            emotion_weights: HashMap::from([
                (Emotion::Neutral, 1.0),
                (Emotion::Happy, 1.2),
                (Emotion::Sad, 1.2),
                (Emotion::Excited, 1.3),
                (Emotion::Calm, 1.1),
            ]),
            speed_weights: HashMap::from([
                (Speed::Medium, 1.0),
                (Speed::Slow, 1.2),
                (Speed::Fast, 1.1),
            ]),
        }
    }
}

impl PricingConfig {
    /// Price any generation request.
    ///
    /// # Errors
    ///
    /// Returns [`GenioError::InvalidParameter`] when an input falls outside
    /// the pricing tables.
    pub fn price(&self, request: &GenerationRequest) -> Result<i64> {
        match request {
            GenerationRequest::Text(req) => self.price_text(req),
            GenerationRequest::Image(req) => self.price_image(req),
            GenerationRequest::Voice(req) => self.price_voice(req),
            GenerationRequest::Video(req) => self.price_video(req.duration_seconds, req.quality),
        }
    }

    /// `round(length_weight * tone_weight)`.
    ///
    /// # Errors
    ///
    /// Returns [`GenioError::InvalidParameter`] for a length or tone missing
    /// from the tables.
    pub fn price_text(&self, req: &TextRequest) -> Result<i64> {
        let length = weight(&self.length_weights, &req.length)?;
        let tone = weight(&self.tone_weights, &req.tone)?;
        Ok(round_credits(length * tone))
    }

    /// `ceil(area / 512² * base_cost[model])`.
    ///
    /// # Errors
    ///
    /// Returns [`GenioError::InvalidParameter`] for an unpriced model.
    #[allow(clippy::cast_precision_loss)]
    pub fn price_image(&self, req: &ImageRequest) -> Result<i64> {
        let base = self
            .image_base_costs
            .get(&req.model)
            .copied()
            .ok_or_else(|| {
                GenioError::invalid_parameter(format!("no price for image model '{}'", req.model))
            })?;
        let units = req.size.area() as f64 / IMAGE_UNIT_AREA;
        Ok(ceil_credits(units * base))
    }

    /// `ceil(ceil(duration / 5) * 10 * quality_weight)`.
    ///
    /// # Errors
    ///
    /// Returns [`GenioError::InvalidParameter`] for a negative or non-finite
    /// duration.
    pub fn price_video(&self, duration_seconds: f64, quality: VideoQuality) -> Result<i64> {
        if !duration_seconds.is_finite() || duration_seconds < 0.0 {
            return Err(GenioError::invalid_parameter(format!(
                "invalid video duration {duration_seconds}"
            )));
        }
        let blocks = (duration_seconds / VIDEO_BLOCK_SECONDS - EPSILON).ceil().max(0.0);
        let weight = weight(&self.quality_weights, &quality)?;
        Ok(ceil_credits(blocks * VIDEO_BLOCK_CREDITS * weight))
    }

    /// `max(1, round(ceil(words / 50) * voice * emotion * speed))`.
    ///
    /// # Errors
    ///
    /// Returns [`GenioError::InvalidParameter`] for an option missing from the
    /// tables.
    #[allow(clippy::cast_precision_loss)]
    pub fn price_voice(&self, req: &VoiceRequest) -> Result<i64> {
        let units = req.word_count().div_ceil(VOICE_WORDS_PER_UNIT) as f64;
        let multiplier = weight(&self.voice_weights, &req.voice)?
            * weight(&self.emotion_weights, &req.emotion)?
            * weight(&self.speed_weights, &req.speed)?;
        Ok(round_credits(units * multiplier))
    }
}

fn weight<K>(table: &HashMap<K, f64>, key: &K) -> Result<f64>
where
    K: std::hash::Hash + Eq + std::fmt::Display,
{
    table
        .get(key)
        .copied()
        .ok_or_else(|| GenioError::invalid_parameter(format!("no price weight for '{key}'")))
}

#[allow(clippy::cast_possible_truncation)]
fn round_credits(value: f64) -> i64 {
    ((value + EPSILON).round() as i64).max(MINIMUM_CHARGE)
}

#[allow(clippy::cast_possible_truncation)]
fn ceil_credits(value: f64) -> i64 {
    ((value - EPSILON).ceil() as i64).max(MINIMUM_CHARGE)
}
