//! Account management handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use genio_core::{ProfileUpdate, User};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Account response.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// User ID.
    pub user_id: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Profile picture URL.
    pub profile_picture: Option<String>,
    /// Current credit balance.
    pub credits: i64,
    /// Whether the email is verified.
    pub verified: bool,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&User> for AccountResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            profile_picture: user.profile_picture.clone(),
            credits: user.credits,
            verified: user.verified,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Create account request.
#[derive(Debug, Default, Deserialize)]
pub struct CreateAccountRequest {
    /// Email; defaults to the token's email claim.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name; defaults to the email's local part.
    #[serde(default)]
    pub name: Option<String>,
    /// Profile picture URL.
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Create the user row for the authenticated principal.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    if state.store.get_user(&auth.user_id).await?.is_some() {
        return Err(ApiError::Conflict("Account already exists".into()));
    }

    let email = body
        .email
        .or(auth.email)
        .map(|e| e.trim().to_lowercase())
        .filter(|e| e.contains('@'))
        .ok_or_else(|| ApiError::Validation("a valid email is required".into()))?;

    let name = body
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    let mut user = User::new(auth.user_id, email, name, 0);
    user.profile_picture = body.profile_picture;
    state.store.create_user(&user).await?;

    let signup_credits = state.config.signup_credits;
    if signup_credits > 0 {
        let grant = state
            .ledger
            .grant(auth.user_id, signup_credits, "Signup credits")
            .await?;
        user.credits = grant.balance_after;
    }

    tracing::info!(user_id = %auth.user_id, credits = user.credits, "Account created");

    Ok(Json(AccountResponse::from(&user)))
}

/// Get the current user's account.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<AccountResponse>, ApiError> {
    let user = state
        .store
        .get_user(&auth.user_id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    Ok(Json(AccountResponse::from(&user)))
}

/// Update profile request.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New profile picture URL.
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Update the current user's name or profile picture.
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let name = body.name.map(|n| n.trim().to_string());
    if name.as_deref() == Some("") {
        return Err(ApiError::Validation("name must not be empty".into()));
    }

    let update = ProfileUpdate {
        name,
        profile_picture: body.profile_picture,
    };
    let user = state.store.update_profile(&auth.user_id, &update).await?;

    tracing::info!(user_id = %auth.user_id, "Profile updated");

    Ok(Json(AccountResponse::from(&user)))
}
