//! Credit transaction types.
//!
//! Every change to a user's balance is recorded as a [`CreditTransaction`].
//! The store fills in `balance_after` when it applies the change, so the value
//! is the balance actually observed inside the atomic update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MediaType, TransactionId, UserId};

/// A credit transaction representing a balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Amount in credits. Positive = credit, negative = debit.
    pub amount: i64,

    /// Type of transaction.
    pub transaction_type: TransactionType,

    /// Balance after this transaction.
    pub balance_after: i64,

    /// Human-readable description.
    pub description: String,

    /// Additional metadata (media type, refunded transaction, etc.).
    pub metadata: serde_json::Value,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    fn new(
        user_id: UserId,
        amount: i64,
        transaction_type: TransactionType,
        description: String,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount,
            transaction_type,
            balance_after: 0,
            description,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// Create a debit paying for a generation.
    #[must_use]
    pub fn generation(user_id: UserId, amount: i64, media_type: MediaType) -> Self {
        Self::new(
            user_id,
            -amount.abs(), // Always negative for debits
            TransactionType::Generation,
            format!("{media_type} generation"),
            serde_json::json!({ "media_type": media_type }),
        )
    }

    /// Create a refund reversing the debit `refunded`.
    #[must_use]
    pub fn refund(user_id: UserId, amount: i64, refunded: TransactionId, reason: String) -> Self {
        Self::new(
            user_id,
            amount.abs(),
            TransactionType::Refund,
            reason,
            serde_json::json!({ "refunded_transaction_id": refunded }),
        )
    }

    /// Create an operator or signup grant.
    #[must_use]
    pub fn grant(user_id: UserId, amount: i64, reason: String) -> Self {
        Self::new(
            user_id,
            amount.abs(),
            TransactionType::Grant,
            reason,
            serde_json::Value::Null,
        )
    }

    /// Absolute number of credits moved by this transaction.
    #[must_use]
    pub fn credits(&self) -> i64 {
        self.amount.abs()
    }
}

/// Type of credit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits deducted to pay for a generation.
    Generation,

    /// A generation debit given back after a failed run.
    Refund,

    /// Credits granted by an operator or at signup.
    Grant,
}

impl TransactionType {
    /// Check if this transaction type adds credits.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::Refund | Self::Grant)
    }

    /// Check if this transaction type removes credits.
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        matches!(self, Self::Generation)
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Refund => "refund",
            Self::Grant => "grant",
        }
    }
}
