//! Storage layer for Genio.
//!
//! This crate persists users, the credit ledger and generation records behind
//! the async [`Store`] trait. Three backends implement it:
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`, the production backend
//! - `RocksStore`: embedded `RocksDB` (feature `rocksdb-backend`)
//! - [`MemoryStore`]: in-process maps for tests and local runs
//!
//! # Ledger atomicity
//!
//! [`Store::debit`] is a conditional decrement: the balance check, the
//! decrement and the transaction row are applied as one unit per user, so two
//! concurrent debits can never both pass against the same credits.
//!
//! # `RocksDB` layout
//!
//! - `users`: user records, keyed by `user_id`
//! - `users_by_email`: email index
//! - `transactions`: credit transactions, keyed by `transaction_id` (ULID)
//! - `transactions_by_user`: index for listing transactions by user
//! - `generations`: generation records, keyed by `generation_id` (ULID)
//! - `generations_by_user`: index for listing history by user and media type
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> genio_store::Result<()> {
//! use genio_core::{CreditTransaction, MediaType, User, UserId};
//! use genio_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let user_id = UserId::generate();
//! store.create_user(&User::new(user_id, "ada@example.com", "Ada", 100)).await?;
//!
//! let debit = CreditTransaction::generation(user_id, 12, MediaType::Text);
//! let recorded = store.debit(&debit).await?;
//! assert_eq!(recorded.balance_after, 88);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod postgres;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use async_trait::async_trait;
use genio_core::{
    CreditTransaction, GenerationRecord, MediaType, ProfileUpdate, TransactionId, User, UserId,
};

/// Default page size for transaction listings.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (PostgreSQL, `RocksDB`, in-memory for testing).
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the id or email is taken.
    async fn create_user(&self, user: &User) -> Result<()>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Get a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Apply a profile update and return the updated user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    async fn update_profile(&self, user_id: &UserId, update: &ProfileUpdate) -> Result<User>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Conditionally decrement the balance of `transaction.user_id` by
    /// `transaction.credits()` and record the transaction, atomically.
    ///
    /// Returns the recorded transaction with `balance_after` filled in.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - `StoreError::InsufficientCredits` if the balance is too low; nothing
    ///   is written.
    /// - `StoreError::InvalidAmount` if the amount is zero.
    async fn debit(&self, transaction: &CreditTransaction) -> Result<CreditTransaction>;

    /// Increment the balance of `transaction.user_id` by
    /// `transaction.credits()` and record the transaction, atomically.
    ///
    /// Used for refunds and grants.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - `StoreError::InvalidAmount` if the amount is zero.
    async fn credit(&self, transaction: &CreditTransaction) -> Result<CreditTransaction>;

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<CreditTransaction>>;

    /// List transactions for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    // =========================================================================
    // Generation Operations
    // =========================================================================

    /// Insert a generation record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_generation(&self, record: &GenerationRecord) -> Result<()>;

    /// List a user's generations of one media type, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_generations(
        &self,
        user_id: &UserId,
        media_type: MediaType,
    ) -> Result<Vec<GenerationRecord>>;
}

/// Balance after applying `delta`, refusing overdraft and overflow.
fn next_balance(credits: i64, delta: i64) -> Result<i64> {
    match credits.checked_add(delta) {
        None => Err(StoreError::BalanceOverflow {
            balance: credits,
            amount: delta,
        }),
        Some(next) if next < 0 => Err(StoreError::InsufficientCredits {
            required: -delta,
            available: credits,
        }),
        Some(next) => Ok(next),
    }
}

fn positive_amount(transaction: &CreditTransaction) -> Result<i64> {
    match transaction.credits() {
        0 => Err(StoreError::InvalidAmount(transaction.amount)),
        amount => Ok(amount),
    }
}
