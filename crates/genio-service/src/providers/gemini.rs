//! Gemini `generateContent` client (text only).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{retry_after_header, Provider, ProviderError, ProviderOutput, ProviderRequest};

/// Default Gemini text model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-lite";

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        // Attempt timeouts are enforced by the gateway; this only bounds a stuck socket.
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn generate_content(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        let body = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_header(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(classify(status, retry_after, text));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::unknown("Gemini returned no text"));
        }
        Ok(text)
    }
}

/// Map a non-success Gemini response to a provider error.
fn classify(status: StatusCode, retry_after: Option<Duration>, body: String) -> ProviderError {
    match status {
        StatusCode::BAD_REQUEST if body.contains("API_KEY_INVALID") => {
            ProviderError::authentication(body)
        }
        StatusCode::BAD_REQUEST => ProviderError::invalid_input(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::authentication(body),
        StatusCode::NOT_FOUND | StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::model_unavailable(retry_after, body)
        }
        StatusCode::SERVICE_UNAVAILABLE => ProviderError::model_loading(retry_after, body),
        _ => ProviderError::unknown(format!("HTTP {status}: {body}")),
    }
}

#[async_trait]
impl Provider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn invoke(
        &self,
        model: &str,
        request: &ProviderRequest,
    ) -> Result<ProviderOutput, ProviderError> {
        match request {
            ProviderRequest::Text { prompt, .. } => self
                .generate_content(model, prompt)
                .await
                .map(ProviderOutput::Text),
            other => Err(ProviderError::invalid_input(format!(
                "Gemini does not support {} generation",
                other.kind()
            ))),
        }
    }
}
