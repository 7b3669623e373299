//! Artifact storage for binary generation outputs.

pub mod cloudinary;

pub use cloudinary::CloudinaryStore;

use async_trait::async_trait;
use bytes::Bytes;

use genio_core::MediaType;

/// Artifact upload failure.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The upload request could not be sent or read.
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The artifact store refused the upload.
    #[error("artifact store rejected upload: HTTP {status}: {message}")]
    Rejected {
        /// HTTP status returned.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The media type has no binary artifact.
    #[error("{0} artifacts are not uploaded")]
    Unsupported(MediaType),
}

/// Durable storage for binary artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload `bytes` and return a permanent URL.
    async fn store(
        &self,
        bytes: Bytes,
        content_type: &str,
        media: MediaType,
    ) -> Result<String, UploadError>;
}
