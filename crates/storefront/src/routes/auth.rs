//! Authentication route handlers.
//!
//! Registration, sign-in (with merge-on-sign-in of the anonymous cart), and
//! sign-out.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use clover_market_core::UserId;

use crate::error::{AppError, Result};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::AuthService;
use crate::services::cart::merge_session_cart;
use crate::state::AppState;

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Signed-in identity response.
#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub id: UserId,
    pub username: String,
}

/// Create a new account and its cart.
///
/// Registration does not sign the user in; they sign in afterwards.
#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<IdentityResponse>)> {
    let user = AuthService::new(state.pool())
        .register(&body.username, &body.password)
        .await?;

    tracing::info!(user_id = %user.id, "account created");

    Ok((
        StatusCode::CREATED,
        Json(IdentityResponse {
            id: user.id,
            username: user.username.into_inner(),
        }),
    ))
}

/// Sign in, then merge any anonymous session cart into the persisted cart.
#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<IdentityResponse>> {
    let user = AuthService::new(state.pool())
        .login(&body.username, &body.password)
        .await?;

    // Move any cart items held in the session into the persisted cart.
    merge_session_cart(state.pool(), &session, user.id).await?;

    let current = CurrentUser {
        id: user.id,
        username: user.username.clone(),
    };
    set_current_user(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("failed to write session: {e}")))?;

    Ok(Json(IdentityResponse {
        id: user.id,
        username: user.username.into_inner(),
    }))
}

/// Sign out.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("failed to clear session: {e}")))?;

    Ok(StatusCode::NO_CONTENT)
}
