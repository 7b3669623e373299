//! Generation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GenerationId, GenerationRequest, MediaType, TransactionId, UserId};

/// Where the produced artifact lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactRef {
    /// Text stored with the record.
    Inline {
        /// The generated content.
        content: String,
    },
    /// Binary payload in the artifact store.
    Url {
        /// Permanent URL returned by the artifact store.
        url: String,
        /// MIME type of the payload.
        content_type: String,
    },
}

impl ArtifactRef {
    /// The URL, for stored artifacts.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url { url, .. } => Some(url),
            Self::Inline { .. } => None,
        }
    }

    /// The inline content, for text artifacts.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Inline { content } => Some(content),
            Self::Url { .. } => None,
        }
    }
}

/// Lifecycle state of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Accepted by the provider, artifact not yet available.
    Pending,
    /// Artifact stored.
    Completed,
    /// Provider gave up after acceptance.
    Failed,
}

impl GenerationStatus {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One successful, paid-for generation.
///
/// A record is written only by the ledger's settle step and references the
/// debit that paid for it through `transaction_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Record ID (ULID; newer records sort higher).
    pub id: GenerationId,

    /// Owning user.
    pub user_id: UserId,

    /// The validated request, including all per-media options.
    pub request: GenerationRequest,

    /// The produced artifact.
    pub artifact: ArtifactRef,

    /// Credits charged.
    pub credit_cost: i64,

    /// The debit transaction that paid for this record.
    pub transaction_id: TransactionId,

    /// Lifecycle state.
    pub status: GenerationStatus,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl GenerationRecord {
    /// Build a completed record.
    #[must_use]
    pub fn completed(
        user_id: UserId,
        request: GenerationRequest,
        artifact: ArtifactRef,
        credit_cost: i64,
        transaction_id: TransactionId,
    ) -> Self {
        Self {
            id: GenerationId::generate(),
            user_id,
            request,
            artifact,
            credit_cost,
            transaction_id,
            status: GenerationStatus::Completed,
            created_at: Utc::now(),
        }
    }

    /// Media type of the record.
    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        self.request.media_type()
    }
}
