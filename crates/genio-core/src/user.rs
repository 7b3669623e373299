//! User accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Credits granted to a new account when no configuration overrides it.
pub const DEFAULT_SIGNUP_CREDITS: i64 = 100;

/// A user account and its prepaid credit balance.
///
/// `credits` is never negative. It is only changed through the ledger's
/// debit and credit operations in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user ID (the principal's stable identifier).
    pub id: UserId,

    /// Email address, unique across users.
    pub email: String,

    /// Display name.
    pub name: String,

    /// Optional profile picture URL.
    pub profile_picture: Option<String>,

    /// Current credit balance.
    pub credits: i64,

    /// Whether the email address has been verified.
    pub verified: bool,

    /// When the user was created.
    pub created_at: DateTime<Utc>,

    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with the given opening balance.
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>, name: impl Into<String>, credits: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: email.into(),
            name: name.into(),
            profile_picture: None,
            credits: credits.max(0),
            verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the balance covers `amount`.
    #[must_use]
    pub fn has_sufficient_credits(&self, amount: i64) -> bool {
        self.credits >= amount
    }

    /// Apply a profile update in place.
    pub fn apply_profile(&mut self, update: &ProfileUpdate) {
        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(picture) = &update.profile_picture {
            self.profile_picture = Some(picture.clone());
        }
        self.updated_at = Utc::now();
    }
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New profile picture URL.
    pub profile_picture: Option<String>,
}
