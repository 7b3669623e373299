//! Hugging Face inference API client.
//!
//! One endpoint per model (`POST {base}/models/{model}`); text models answer
//! with JSON, image/audio/video models answer with the raw payload.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    retry_after_header, Provider, ProviderError, ProviderOutput, ProviderRequest, VIDEO_FPS,
};

/// Primary text model.
pub const TEXT_MODEL: &str = "facebook/opt-350m";

/// Smaller text model used as fallback.
pub const TEXT_FALLBACK_MODEL: &str = "EleutherAI/gpt-neo-125M";

/// Text-to-image model.
pub const IMAGE_MODEL: &str = genio_core::DEFAULT_IMAGE_MODEL;

/// Text-to-audio model.
pub const AUDIO_MODEL: &str = "stabilityai/stable-audio-open-1.0";

/// Text-to-video model.
pub const VIDEO_MODEL: &str = "Lightricks/LTX-Video";

const VIDEO_NEGATIVE_PROMPT: &str =
    "worst quality, inconsistent motion, blurry, jittery, distorted, unrealistic motion";

/// Hugging Face inference client.
#[derive(Debug, Clone)]
pub struct HuggingFaceClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextGenerationResponse {
    Many(Vec<GeneratedText>),
    One(GeneratedText),
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

impl HuggingFaceClient {
    /// Create a new Hugging Face client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn post(&self, model: &str, body: &Value) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/models/{model}", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = retry_after_header(response.headers());
        let text = response.text().await.unwrap_or_default();
        tracing::debug!(model, %status, body = %text, "Hugging Face request failed");
        Err(classify(status, retry_after, text))
    }
}

/// Map a non-success inference response to a provider error.
fn classify(status: StatusCode, retry_after: Option<Duration>, body: String) -> ProviderError {
    match status {
        StatusCode::SERVICE_UNAVAILABLE => ProviderError::model_loading(retry_after, body),
        StatusCode::NOT_FOUND | StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::model_unavailable(retry_after, body)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::authentication(body),
        _ if body.to_ascii_lowercase().contains("invalid token") => {
            ProviderError::authentication(body)
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::invalid_input(body)
        }
        _ => ProviderError::unknown(format!("HTTP {status}: {body}")),
    }
}

fn request_body(request: &ProviderRequest) -> Value {
    let options = json!({ "wait_for_model": true, "use_cache": false });
    match request {
        ProviderRequest::Text {
            prompt,
            max_new_tokens,
        } => json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": max_new_tokens,
                "temperature": 0.8,
                "top_p": 0.95,
                "do_sample": true,
                "return_full_text": false
            },
            "options": options
        }),
        ProviderRequest::Image {
            prompt,
            negative_prompt,
            width,
            height,
        } => json!({
            "inputs": prompt,
            "parameters": {
                "negative_prompt": negative_prompt,
                "width": width,
                "height": height,
                "num_inference_steps": 50,
                "guidance_scale": 7.5
            },
            "options": options
        }),
        ProviderRequest::Audio { text } => json!({
            "inputs": text,
            "parameters": {
                "audio_end_in_s": 10.0,
                "num_inference_steps": 200,
                "negative_prompt": "Low quality",
                "num_waveforms_per_prompt": 1
            },
            "options": options
        }),
        ProviderRequest::Video {
            prompt,
            num_frames,
            width,
            height,
        } => json!({
            "inputs": prompt,
            "parameters": {
                "num_frames": num_frames,
                "height": height,
                "width": width,
                "num_inference_steps": 50,
                "guidance_scale": 12.5,
                "negative_prompt": VIDEO_NEGATIVE_PROMPT,
                "fps": VIDEO_FPS
            },
            "options": options
        }),
    }
}

fn default_content_type(request: &ProviderRequest) -> &'static str {
    match request {
        ProviderRequest::Text { .. } => "text/plain",
        ProviderRequest::Image { .. } => "image/jpeg",
        ProviderRequest::Audio { .. } => "audio/wav",
        ProviderRequest::Video { .. } => "video/mp4",
    }
}

#[async_trait]
impl Provider for HuggingFaceClient {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn invoke(
        &self,
        model: &str,
        request: &ProviderRequest,
    ) -> Result<ProviderOutput, ProviderError> {
        let response = self.post(model, &request_body(request)).await?;

        if let ProviderRequest::Text { .. } = request {
            let parsed: TextGenerationResponse = response.json().await?;
            let text = match parsed {
                TextGenerationResponse::Many(items) => items
                    .into_iter()
                    .next()
                    .map(|g| g.generated_text)
                    .unwrap_or_default(),
                TextGenerationResponse::One(g) => g.generated_text,
            };
            let text = text.trim();
            if text.is_empty() {
                return Err(ProviderError::unknown("model returned no text"));
            }
            return Ok(ProviderOutput::Text(text.to_string()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| default_content_type(request).to_string(), str::to_string);
        if content_type.starts_with("application/json") {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::unknown(format!(
                "expected {} payload, got JSON: {body}",
                request.kind()
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::unknown("model returned an empty payload"));
        }
        Ok(ProviderOutput::Binary {
            bytes,
            content_type,
        })
    }
}
