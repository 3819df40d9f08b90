//! Dashboard endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::dashboard::{DashboardFeed, DashboardView};

/// `GET /app/dashboard`
///
/// Mounts the feed on demand when the listeners could not be attached at
/// sign-in.
pub async fn view(State(ctx): State<ApiContext>) -> Result<Json<DashboardView>, ApiError> {
    let ticket = ctx.state.current_session()?;
    if !ctx.has_dashboard() {
        let feed = DashboardFeed::mount(&ctx.store, Arc::clone(&ctx.state), ticket)
            .map_err(|e| ApiError::Upstream(e.to_string()))?;
        ctx.mount_dashboard(feed)?;
    }
    let view = ctx
        .dashboard_view()?
        .ok_or_else(|| ApiError::Internal("dashboard not mounted".into()))?;
    Ok(Json(view))
}
