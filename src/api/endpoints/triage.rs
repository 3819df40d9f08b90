//! Triage submission and result endpoints.
//!
//! `POST /app/triage` — validate and submit the form, returns the result view
//! `GET /app/result` — view of the last result

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, TriageRequest};
use crate::result_view::{render_result, ResultView};
use crate::triage_form::{self, FormMode};

/// `POST /app/triage`
///
/// History and profile writes are not awaited; the dashboard picks them up
/// through its listeners.
pub async fn submit(
    State(ctx): State<ApiContext>,
    Json(req): Json<TriageRequest>,
) -> Result<Json<ResultView>, ApiError> {
    let mut form = req.into_form(FormMode::from_config(ctx.config.require_vitals))?;
    let outcome = triage_form::submit(&ctx, &mut form).await?;
    Ok(Json(render_result(&outcome.result)))
}

/// `GET /app/result`
pub async fn last(State(ctx): State<ApiContext>) -> Result<Json<ResultView>, ApiError> {
    ctx.state.require_uid()?;
    let result = ctx
        .state
        .last_result()?
        .ok_or_else(|| ApiError::NotFound("No triage result yet".into()))?;
    Ok(Json(render_result(&result)))
}
