//! Onboarding endpoint.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OnboardingResponse};
use crate::onboarding::{self, OnboardingInput};

/// `POST /app/onboarding` — save age and gender.
///
/// The remote profile write runs in the background.
pub async fn save(
    State(ctx): State<ApiContext>,
    Json(input): Json<OnboardingInput>,
) -> Result<Json<OnboardingResponse>, ApiError> {
    let (demographics, write) = onboarding::complete_onboarding(&ctx, &input)?;
    Ok(Json(OnboardingResponse {
        demographics,
        saved_remotely: write.is_some(),
    }))
}
