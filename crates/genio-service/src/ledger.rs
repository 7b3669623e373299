//! Balance ledger.
//!
//! The ledger is the only code path that changes a balance. A generation pays
//! through a [`Reservation`]: [`Ledger::check_and_debit`] produces it and
//! exactly one of [`Ledger::settle`] or [`Ledger::refund`] consumes it.

use std::sync::Arc;

use genio_core::{CreditTransaction, GenerationRecord, MediaType, TransactionId, UserId};
use genio_store::{Store, StoreError};

/// Credits taken for one generation that is still in flight.
#[derive(Debug)]
#[must_use = "a reservation must be settled or refunded"]
pub struct Reservation {
    user_id: UserId,
    amount: i64,
    media: MediaType,
    transaction_id: TransactionId,
    balance_after: i64,
}

impl Reservation {
    /// User who paid.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Credits debited.
    #[must_use]
    pub const fn amount(&self) -> i64 {
        self.amount
    }

    /// Media type paid for.
    #[must_use]
    pub const fn media(&self) -> MediaType {
        self.media
    }

    /// The debit transaction.
    #[must_use]
    pub const fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Balance right after the debit.
    #[must_use]
    pub const fn balance_after(&self) -> i64 {
        self.balance_after
    }
}

/// A settle that did not persist; the reservation is handed back for refund.
#[derive(Debug)]
pub struct SettleFailure {
    /// The unconsumed reservation.
    pub reservation: Reservation,
    /// Why the record was not written.
    pub error: StoreError,
}

/// Credit ledger over a [`Store`].
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    /// Create a ledger.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current balance of `user_id`.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the user doesn't exist.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<i64, StoreError> {
        self.store
            .get_user(user_id)
            .await?
            .map(|u| u.credits)
            .ok_or_else(|| StoreError::user_not_found(user_id))
    }

    /// Take `amount` credits from `user_id` if the balance covers it.
    ///
    /// # Errors
    ///
    /// `StoreError::InsufficientCredits` with nothing written if the balance
    /// is too low, `StoreError::NotFound` if the user doesn't exist.
    pub async fn check_and_debit(
        &self,
        user_id: UserId,
        amount: i64,
        media: MediaType,
    ) -> Result<Reservation, StoreError> {
        let debit = CreditTransaction::generation(user_id, amount, media);
        let recorded = self.store.debit(&debit).await?;

        tracing::debug!(
            user_id = %user_id,
            amount,
            %media,
            transaction_id = %recorded.id,
            balance = recorded.balance_after,
            "Credits reserved"
        );

        Ok(Reservation {
            user_id,
            amount,
            media,
            transaction_id: recorded.id,
            balance_after: recorded.balance_after,
        })
    }

    /// Persist the record paid for by `reservation`.
    ///
    /// Returns the balance right after the debit.
    ///
    /// # Errors
    ///
    /// Returns the reservation with the store error when the record could not
    /// be written, so the caller can refund it.
    pub async fn settle(
        &self,
        reservation: Reservation,
        record: &GenerationRecord,
    ) -> Result<i64, SettleFailure> {
        match self.store.put_generation(record).await {
            Ok(()) => {
                tracing::debug!(
                    user_id = %reservation.user_id,
                    generation_id = %record.id,
                    transaction_id = %reservation.transaction_id,
                    "Generation settled"
                );
                Ok(reservation.balance_after)
            }
            Err(error) => Err(SettleFailure { reservation, error }),
        }
    }

    /// Give back the credits taken by `reservation`.
    ///
    /// Returns the balance after the refund.
    ///
    /// # Errors
    ///
    /// Returns the store error if the refund could not be recorded.
    pub async fn refund(&self, reservation: Reservation, reason: &str) -> Result<i64, StoreError> {
        let refund = CreditTransaction::refund(
            reservation.user_id,
            reservation.amount,
            reservation.transaction_id,
            format!("Refund for failed {} generation: {reason}", reservation.media),
        );
        let recorded = self.store.credit(&refund).await?;

        tracing::info!(
            user_id = %reservation.user_id,
            amount = reservation.amount,
            refunded_transaction_id = %reservation.transaction_id,
            balance = recorded.balance_after,
            reason,
            "Credits refunded"
        );
        Ok(recorded.balance_after)
    }

    /// Add `amount` credits to `user_id`.
    ///
    /// # Errors
    ///
    /// `StoreError::InvalidAmount` for a non-positive amount, `StoreError::NotFound`
    /// if the user doesn't exist.
    pub async fn grant(
        &self,
        user_id: UserId,
        amount: i64,
        reason: &str,
    ) -> Result<CreditTransaction, StoreError> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }
        let grant = CreditTransaction::grant(user_id, amount, reason.to_string());
        let recorded = self.store.credit(&grant).await?;

        tracing::info!(
            user_id = %user_id,
            amount,
            balance = recorded.balance_after,
            reason,
            "Credits granted"
        );
        Ok(recorded)
    }
}
