//! Generation orchestrator.
//!
//! One run moves a request through validation, pricing, the balance check,
//! the provider call, the artifact upload and persistence. Credits are debited
//! before the provider is called; every failure after the debit refunds it
//! before the error is returned.

use std::sync::Arc;
use std::time::Duration;

use genio_core::{
    ArtifactRef, GenerationRecord, GenerationRequest, GenioError, MediaType, PricingConfig,
    TransactionId, UserId,
};
use genio_store::StoreError;

use crate::artifacts::ArtifactStore;
use crate::gateway::ProviderGateway;
use crate::ledger::{Ledger, Reservation, SettleFailure};
use crate::providers::{ProviderError, ProviderOutput, ProviderRequest};

/// Why a generation did not complete.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The request failed validation or pricing. Nothing was charged.
    #[error(transparent)]
    Validation(#[from] GenioError),

    /// No provider or artifact store is configured for the media type.
    #[error("{0} generation is not available")]
    Unavailable(MediaType),

    /// The principal has no user row.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// The balance does not cover the price. Nothing was charged.
    #[error("insufficient credits: required={required}, available={available}")]
    InsufficientCredits {
        /// Price of the request.
        required: i64,
        /// Balance observed by the debit.
        available: i64,
    },

    /// The provider failed after retries. The debit was refunded.
    #[error("provider error: {0}")]
    Provider(ProviderError),

    /// The artifact could not be stored. The debit was refunded.
    #[error("artifact upload failed: {0}")]
    UploadFailure(String),

    /// The record could not be written. The debit was refunded.
    #[error("failed to persist generation: {0}")]
    PersistenceFailure(String),

    /// The run exceeded its deadline. The debit was refunded.
    #[error("generation did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    /// A refund failed: the user was charged for nothing.
    #[error("ledger inconsistency: {amount} credits for user {user_id} (transaction {transaction_id}) not refunded: {cause}")]
    LedgerInconsistency {
        /// User left charged.
        user_id: UserId,
        /// Credits not refunded.
        amount: i64,
        /// The orphaned debit.
        transaction_id: TransactionId,
        /// Original failure and refund failure.
        cause: String,
    },

    /// Unexpected failure outside the ledger.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GenerationError {
    fn from_debit(user_id: UserId, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::UserNotFound(user_id),
            StoreError::InsufficientCredits {
                required,
                available,
            } => Self::InsufficientCredits {
                required,
                available,
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

/// A completed generation.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// The persisted record.
    pub record: GenerationRecord,
    /// Balance after the charge.
    pub balance: i64,
}

/// Runs generation requests end to end.
#[derive(Clone)]
pub struct Orchestrator {
    ledger: Ledger,
    pricing: Arc<PricingConfig>,
    gateway: Arc<ProviderGateway>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    deadline: Duration,
}

impl Orchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        ledger: Ledger,
        pricing: PricingConfig,
        gateway: ProviderGateway,
        artifacts: Option<Arc<dyn ArtifactStore>>,
        deadline: Duration,
    ) -> Self {
        Self {
            ledger,
            pricing: Arc::new(pricing),
            gateway: Arc::new(gateway),
            artifacts,
            deadline,
        }
    }

    /// Whether requests for `media` can be served.
    #[must_use]
    pub fn is_available(&self, media: MediaType) -> bool {
        self.gateway.has_route(media) && (!media.is_binary() || self.artifacts.is_some())
    }

    /// Pricing tables in use.
    #[must_use]
    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Run `request` for `user_id`.
    ///
    /// The run executes on its own task, so dropping the returned future does
    /// not interrupt a run between debit and settle or refund.
    ///
    /// # Errors
    ///
    /// See [`GenerationError`]; every variant raised after the debit has
    /// already been refunded, except [`GenerationError::LedgerInconsistency`]
    /// and the [`GenerationError::Internal`] returned when the run panics.
    pub async fn generate(
        &self,
        user_id: UserId,
        request: GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        let media = request.media_type();
        let this = self.clone();
        tokio::spawn(async move { this.run(user_id, request).await })
            .await
            .map_err(|e| {
                tracing::error!(
                    user_id = %user_id,
                    %media,
                    error = %e,
                    "Generation task aborted, debit may be orphaned"
                );
                GenerationError::Internal(format!("generation task failed: {e}"))
            })?
    }

    async fn run(
        &self,
        user_id: UserId,
        request: GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        let media = request.media_type();

        request.validate()?;
        if !self.is_available(media) {
            return Err(GenerationError::Unavailable(media));
        }

        let cost = self.pricing.price(&request)?;
        tracing::debug!(user_id = %user_id, %media, cost, "Generation priced");

        let reservation = self
            .ledger
            .check_and_debit(user_id, cost, media)
            .await
            .map_err(|e| GenerationError::from_debit(user_id, e))?;

        let artifact = match tokio::time::timeout(self.deadline, self.produce(&request)).await {
            Ok(Ok(artifact)) => artifact,
            Ok(Err(err)) => return Err(self.compensate(reservation, err).await),
            Err(_) => {
                let err = GenerationError::Timeout(self.deadline);
                return Err(self.compensate(reservation, err).await);
            }
        };

        let record = GenerationRecord::completed(
            user_id,
            request,
            artifact,
            cost,
            reservation.transaction_id(),
        );

        match self.ledger.settle(reservation, &record).await {
            Ok(balance) => {
                tracing::info!(
                    user_id = %user_id,
                    %media,
                    generation_id = %record.id,
                    cost,
                    balance,
                    "Generation completed"
                );
                Ok(GenerationOutcome { record, balance })
            }
            Err(SettleFailure { reservation, error }) => {
                let err = GenerationError::PersistenceFailure(error.to_string());
                Err(self.compensate(reservation, err).await)
            }
        }
    }

    /// Call the provider and store its output.
    async fn produce(&self, request: &GenerationRequest) -> Result<ArtifactRef, GenerationError> {
        let media = request.media_type();
        let model = match request {
            GenerationRequest::Image(req) => Some(req.model.as_str()),
            _ => None,
        };

        let output = self
            .gateway
            .invoke(media, &ProviderRequest::from_generation(request), model)
            .await
            .map_err(GenerationError::Provider)?;

        match (media.is_binary(), output) {
            (false, ProviderOutput::Text(content)) => Ok(ArtifactRef::Inline { content }),
            (true, ProviderOutput::Binary {
                bytes,
                content_type,
            }) => {
                let store = self
                    .artifacts
                    .as_ref()
                    .ok_or(GenerationError::Unavailable(media))?;
                let url = store
                    .store(bytes, &content_type, media)
                    .await
                    .map_err(|e| GenerationError::UploadFailure(e.to_string()))?;
                Ok(ArtifactRef::Url { url, content_type })
            }
            (_, ProviderOutput::Text(_)) => Err(GenerationError::Provider(ProviderError::unknown(
                format!("provider returned text for a {media} request"),
            ))),
            (_, ProviderOutput::Binary { .. }) => Err(GenerationError::Provider(
                ProviderError::unknown("provider returned binary output for a text request"),
            )),
        }
    }

    /// Refund `reservation` after `err`. A failed refund escalates.
    async fn compensate(&self, reservation: Reservation, err: GenerationError) -> GenerationError {
        let user_id = reservation.user_id();
        let amount = reservation.amount();
        let transaction_id = reservation.transaction_id();
        let media = reservation.media();

        match self.ledger.refund(reservation, &err.to_string()).await {
            Ok(balance) => {
                tracing::warn!(
                    user_id = %user_id,
                    %media,
                    amount,
                    balance,
                    error = %err,
                    "Generation failed, credits refunded"
                );
                err
            }
            Err(refund_err) => {
                tracing::error!(
                    user_id = %user_id,
                    %media,
                    amount,
                    transaction_id = %transaction_id,
                    error = %err,
                    refund_error = %refund_err,
                    "Refund failed, ledger inconsistent"
                );
                GenerationError::LedgerInconsistency {
                    user_id,
                    amount,
                    transaction_id,
                    cause: format!("{err}; refund failed: {refund_err}"),
                }
            }
        }
    }
}
