//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage. The
//! PostgreSQL schema lives in `migrations/`.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary user records, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Index: user id by email, keyed by the email bytes.
    pub const USERS_BY_EMAIL: &str = "users_by_email";

    /// Credit transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by user, keyed by `user_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Generation records, keyed by `generation_id` (ULID).
    pub const GENERATIONS: &str = "generations";

    /// Index: generations by user and media type, keyed by
    /// `user_id || media_tag || generation_id`. Value is empty.
    pub const GENERATIONS_BY_USER: &str = "generations_by_user";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::USERS_BY_EMAIL,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::GENERATIONS,
        cf::GENERATIONS_BY_USER,
    ]
}
