//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub app: &'static str,
    pub version: &'static str,
    pub auth_resolved: bool,
    /// Status reported by the triage service, when reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triage_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triage_service_error: Option<String>,
}

/// `GET /app/health` — app version plus triage service reachability.
///
/// Always 200: an unreachable service is reported in the body.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let (triage_service, triage_service_error) = match ctx.api.health().await {
        Ok(status) => (Some(status.status), None),
        Err(e) => {
            tracing::debug!(error = %e, "Triage service health check failed");
            (None, Some(e.to_string()))
        }
    };

    Json(HealthResponse {
        status: "ok",
        app: crate::config::APP_NAME,
        version: crate::config::APP_VERSION,
        auth_resolved: ctx.state.is_auth_resolved(),
        triage_service,
        triage_service_error,
    })
}
