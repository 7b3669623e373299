//! Cloudinary signed uploads.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use genio_core::MediaType;

use super::{ArtifactStore, UploadError};
use crate::config::CloudinaryConfig;

/// Cloudinary upload client.
#[derive(Debug, Clone)]
pub struct CloudinaryStore {
    client: Client,
    base_url: String,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryStore {
    /// Create a new Cloudinary client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        config: CloudinaryConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            config,
        })
    }
}

/// Upload endpoint resource type and folder for a media type.
///
/// Cloudinary files audio under the `video` resource type.
const fn destination(media: MediaType) -> Option<(&'static str, &'static str)> {
    match media {
        MediaType::Image => Some(("image", "generated_images")),
        MediaType::Voice => Some(("video", "audio_uploads")),
        MediaType::Video => Some(("video", "generated_videos")),
        MediaType::Text => None,
    }
}

/// SHA-256 signature over the sorted upload parameters followed by the secret.
fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_unstable_by_key(|(k, _)| *k);
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn file_name(content_type: &str) -> String {
    let ext = content_type
        .split(';')
        .next()
        .and_then(|mime| mime.split('/').nth(1))
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin");
    format!("artifact.{ext}")
}

#[async_trait]
impl ArtifactStore for CloudinaryStore {
    async fn store(
        &self,
        bytes: Bytes,
        content_type: &str,
        media: MediaType,
    ) -> Result<String, UploadError> {
        let (resource_type, folder) = destination(media).ok_or(UploadError::Unsupported(media))?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", folder), ("timestamp", &timestamp)],
            &self.config.api_secret,
        );

        let file = Part::bytes(bytes.to_vec())
            .file_name(file_name(content_type))
            .mime_str(content_type)?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let url = format!(
            "{}/v1_1/{}/{resource_type}/upload",
            self.base_url, self.config.cloud_name
        );
        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %media, body = %message, "Cloudinary upload rejected");
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::debug!(%media, url = %uploaded.secure_url, "Artifact uploaded");
        Ok(uploaded.secure_url)
    }
}
