//! Error types for Genio storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// Key that was looked up.
        id: String,
    },

    /// A unique key (user id or email) is already taken.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Insufficient credits for the debit.
    #[error("insufficient credits: required={required}, available={available}")]
    InsufficientCredits {
        /// Credits the debit asked for.
        required: i64,
        /// Balance observed when the debit was refused.
        available: i64,
    },

    /// The credit would push the balance past `i64::MAX`.
    #[error("balance overflow: balance={balance}, amount={amount}")]
    BalanceOverflow {
        /// Balance before the credit.
        balance: i64,
        /// Credits that were refused.
        amount: i64,
    },

    /// Debit and credit amounts must be positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),
}

impl StoreError {
    /// Shorthand for a missing user.
    #[must_use]
    pub fn user_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "user",
            id: id.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::AlreadyExists(db.message().to_string())
            }
            _ => Self::Database(e.to_string()),
        }
    }
}
