//! Onboarding: age and gender capture.
//!
//! Demographics land in client state right away. For a signed-in user they
//! are also merged into the remote profile (in the background) and written
//! to the local profile cache.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::context::AppContext;
use crate::core_state::CoreError;
use crate::models::{Demographics, Gender};
use crate::store::{CachedProfile, PendingWrite};

pub const MIN_AGE: u8 = 1;
pub const MAX_AGE: u8 = 120;

#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Please enter your age as a whole number between 1 and 120")]
    InvalidAge,
    #[error("Please select a gender (Male, Female or Other)")]
    InvalidGender,
    #[error(transparent)]
    State(#[from] CoreError),
}

/// Onboarding input as typed by the user.
#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingInput {
    pub age: String,
    pub gender: String,
}

pub fn parse_demographics(input: &OnboardingInput) -> Result<Demographics, OnboardingError> {
    let age = input
        .age
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|a| (MIN_AGE..=MAX_AGE).contains(a))
        .ok_or(OnboardingError::InvalidAge)?;
    let gender = Gender::from_input(&input.gender).ok_or(OnboardingError::InvalidGender)?;
    Ok(Demographics { age, gender })
}

/// Store demographics for the current user.
///
/// Returns the remote write when a user is signed in.
pub fn complete_onboarding(
    ctx: &AppContext,
    input: &OnboardingInput,
) -> Result<(Demographics, Option<PendingWrite>), OnboardingError> {
    let demographics = parse_demographics(input)?;
    ctx.state.set_demographics(Some(demographics))?;

    let Some(user) = ctx.state.current_user()? else {
        tracing::debug!("Demographics kept in memory only, no user signed in");
        return Ok((demographics, None));
    };

    let cached = CachedProfile {
        demographics: Some(demographics),
        session_count: ctx.state.session_count()?,
        updated_at: Utc::now(),
    };
    if let Err(e) = ctx.cache.save(&user.uid, &cached) {
        tracing::warn!(error = %e, "Could not cache demographics locally");
    }

    let store = Arc::clone(&ctx.store);
    let uid = user.uid;
    let write = PendingWrite::spawn("save_demographics", async move {
        store.save_demographics(&uid, demographics).await
    });
    tracing::info!(age = demographics.age, gender = %demographics.gender, "Onboarding complete");
    Ok((demographics, Some(write)))
}
