//! Identity provider events and the session view.
//!
//! `POST /app/auth/signed-in` — the web shell forwards a sign-in
//! `POST /app/auth/signed-out` — the web shell forwards a sign-out
//! `GET /app/session` — current session view

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SignedInResponse};
use crate::core_state::UserIdentity;
use crate::session::{self, SessionView};

/// `POST /app/auth/signed-in` — store identity, restore profile, mount the
/// dashboard feed.
pub async fn signed_in(
    State(ctx): State<ApiContext>,
    Json(user): Json<UserIdentity>,
) -> Result<Json<SignedInResponse>, ApiError> {
    if user.uid.trim().is_empty() {
        return Err(ApiError::Validation("uid cannot be empty".into()));
    }
    let restored = session::sign_in(&ctx, user).await?;
    Ok(Json(SignedInResponse {
        restored,
        session: session::session_view(&ctx)?,
    }))
}

/// `POST /app/auth/signed-out` — tear down listeners and clear state.
pub async fn signed_out(State(ctx): State<ApiContext>) -> Result<Json<SessionView>, ApiError> {
    session::sign_out(&ctx)?;
    Ok(Json(session::session_view(&ctx)?))
}

/// `GET /app/session`
pub async fn current(State(ctx): State<ApiContext>) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(session::session_view(&ctx)?))
}
