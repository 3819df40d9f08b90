//! Triage form: input state, validation and submission.
//!
//! The form holds raw user input (vitals as typed strings) and turns it
//! into a `TriageSubmission` only when every rule passes. Submission runs
//! the remote analysis exactly once under the in-flight guard, stores the
//! result in client state and writes history and the profile visit in the
//! background.

use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::core_state::{CoreError, SessionTicket};
use crate::models::{
    Attachment, Demographics, HistoryEntry, NewHistoryEntry, TriageResult, TriageSubmission,
    Vitals, NO_CONDITIONS,
};
use crate::store::{CachedProfile, PendingWrite, TriageVisit};
use crate::triage_api::ApiClientError;

/// Upload types the triage service accepts.
pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
];

/// Largest accepted attachment (10 MiB).
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

pub const HEART_RATE_RANGE: std::ops::RangeInclusive<u16> = 20..=250;
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 30.0..=45.0;

static BLOOD_PRESSURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2,3}/\d{2,3}$").unwrap());

// ═══════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please complete your profile (age and gender) before starting a triage")]
    MissingDemographics,
    #[error("Please select at least one symptom or upload a medical report")]
    NoSymptoms,
    #[error("Please fill in all vital signs (blood pressure, heart rate and temperature)")]
    MissingVitals,
    #[error("Blood pressure must be entered as systolic/diastolic, e.g. 120/80")]
    InvalidBloodPressure,
    #[error("Heart rate must be a whole number between 20 and 250 bpm")]
    InvalidHeartRate,
    #[error("Temperature must be a number between 30.0 and 45.0 °C")]
    InvalidTemperature,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentError {
    #[error("Unsupported file type: {0}. Upload a PDF or an image (PNG, JPEG, WebP, GIF)")]
    UnsupportedType(String),
    #[error("The selected file is empty")]
    Empty,
    #[error("The selected file could not be read")]
    Unreadable,
    #[error("File too large ({size} bytes, max 10 MB)")]
    TooLarge { size: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("A triage analysis is already in progress")]
    AlreadySubmitting,
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error(transparent)]
    State(#[from] CoreError),
}

// ═══════════════════════════════════════════
// Form state
// ═══════════════════════════════════════════

/// Whether vitals are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormMode {
    /// Symptoms (or a file) plus all three vitals.
    Strict,
    /// Symptoms (or a file) only; vitals are sent when filled in.
    Lenient,
}

impl FormMode {
    pub fn from_config(require_vitals: bool) -> Self {
        if require_vitals {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// Raw triage form input.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageForm {
    pub mode: FormMode,
    symptoms: Vec<String>,
    conditions: Vec<String>,
    pub blood_pressure: String,
    pub heart_rate: String,
    pub temperature: String,
    attachment: Option<Attachment>,
    /// Inline error shown under the form.
    pub error: Option<String>,
}

impl TriageForm {
    pub fn new(mode: FormMode) -> Self {
        Self {
            mode,
            symptoms: Vec::new(),
            conditions: Vec::new(),
            blood_pressure: String::new(),
            heart_rate: String::new(),
            temperature: String::new(),
            attachment: None,
            error: None,
        }
    }

    pub fn symptoms(&self) -> &[String] {
        &self.symptoms
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Select or deselect a symptom.
    pub fn toggle_symptom(&mut self, symptom: &str) {
        let symptom = symptom.trim();
        if symptom.is_empty() {
            return;
        }
        if let Some(pos) = self.symptoms.iter().position(|s| s == symptom) {
            self.symptoms.remove(pos);
        } else {
            self.symptoms.push(symptom.to_string());
        }
    }

    /// Select or deselect a condition.
    ///
    /// Selecting `"None"` clears every other condition; selecting anything
    /// else removes `"None"`.
    pub fn toggle_condition(&mut self, condition: &str) {
        let condition = condition.trim();
        if condition.is_empty() {
            return;
        }
        if let Some(pos) = self.conditions.iter().position(|c| c == condition) {
            self.conditions.remove(pos);
            return;
        }
        if condition == NO_CONDITIONS {
            self.conditions.clear();
        } else {
            self.conditions.retain(|c| c != NO_CONDITIONS);
        }
        self.conditions.push(condition.to_string());
    }

    /// Attach a report. `mime_type` is guessed from the file name when the
    /// caller has none.
    ///
    /// On rejection the attachment is cleared and the inline error set.
    pub fn attach(
        &mut self,
        file_name: &str,
        mime_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<(), AttachmentError> {
        match check_attachment(file_name, mime_type, bytes) {
            Ok(attachment) => {
                tracing::debug!(?attachment, "Attachment accepted");
                self.attachment = Some(attachment);
                self.error = None;
                Ok(())
            }
            Err(e) => {
                self.attachment = None;
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Validate the input and build the submission.
    pub fn to_submission(
        &self,
        demographics: Option<Demographics>,
    ) -> Result<TriageSubmission, ValidationError> {
        let demographics = demographics.ok_or(ValidationError::MissingDemographics)?;

        if self.symptoms.is_empty() && self.attachment.is_none() {
            return Err(ValidationError::NoSymptoms);
        }

        let vitals = Vitals {
            blood_pressure: parse_blood_pressure(&self.blood_pressure)?,
            heart_rate: parse_heart_rate(&self.heart_rate)?,
            temperature: parse_temperature(&self.temperature)?,
        };
        if self.mode == FormMode::Strict && !vitals.is_complete() {
            return Err(ValidationError::MissingVitals);
        }

        Ok(TriageSubmission {
            demographics,
            symptoms: self.symptoms.clone(),
            conditions: self.conditions.clone(),
            vitals,
            attachment: self.attachment.clone(),
        })
    }
}

fn check_attachment(
    file_name: &str,
    mime_type: Option<&str>,
    bytes: Vec<u8>,
) -> Result<Attachment, AttachmentError> {
    let mime_type = match mime_type.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.to_ascii_lowercase(),
        None => mime_guess::from_path(file_name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    };
    if !ACCEPTED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(AttachmentError::UnsupportedType(mime_type));
    }
    if bytes.is_empty() {
        return Err(AttachmentError::Empty);
    }
    if bytes.len() > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge { size: bytes.len() });
    }
    Ok(Attachment {
        file_name: file_name.to_string(),
        mime_type,
        bytes,
    })
}

fn parse_blood_pressure(raw: &str) -> Result<Option<String>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if BLOOD_PRESSURE.is_match(&compact) {
        Ok(Some(compact))
    } else {
        Err(ValidationError::InvalidBloodPressure)
    }
}

fn parse_heart_rate(raw: &str) -> Result<Option<u16>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<u16>() {
        Ok(bpm) if HEART_RATE_RANGE.contains(&bpm) => Ok(Some(bpm)),
        _ => Err(ValidationError::InvalidHeartRate),
    }
}

fn parse_temperature(raw: &str) -> Result<Option<f32>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f32>() {
        Ok(t) if t.is_finite() && TEMPERATURE_RANGE.contains(&t) => {
            Ok(Some((t * 10.0).round() / 10.0))
        }
        _ => Err(ValidationError::InvalidTemperature),
    }
}

// ═══════════════════════════════════════════
// Submission
// ═══════════════════════════════════════════

/// A successful analysis plus its background writes.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub result: TriageResult,
    pub history_write: PendingWrite<HistoryEntry>,
    pub visit_write: PendingWrite<u32>,
}

/// Validate, analyze once, store the result and persist in the background.
///
/// Failures are also recorded on `form.error`; the form keeps its input.
pub async fn submit(ctx: &AppContext, form: &mut TriageForm) -> Result<SubmitOutcome, SubmitError> {
    let outcome = run_submission(ctx, form).await;
    match &outcome {
        Ok(_) => form.error = None,
        Err(e) => form.error = Some(e.to_string()),
    }
    outcome
}

async fn run_submission(ctx: &AppContext, form: &TriageForm) -> Result<SubmitOutcome, SubmitError> {
    let submission = form.to_submission(ctx.state.demographics()?)?;
    let session = ctx.state.current_session()?;

    let Some(_in_flight) = ctx.state.begin_submission() else {
        tracing::debug!("Submission rejected, another one is in flight");
        return Err(SubmitError::AlreadySubmitting);
    };

    tracing::info!(
        symptoms = submission.symptoms.len(),
        has_attachment = submission.attachment.is_some(),
        "Submitting triage analysis"
    );
    let result = ctx.api.analyze(&submission).await?;

    // The result and its writes belong to the session that submitted.
    let (history_write, visit_write) = ctx
        .state
        .with_session(&session, || {
            ctx.state.set_result(result.clone())?;
            Ok(spawn_writes(ctx, &session, &submission, &result))
        })
        .inspect_err(|e| {
            if matches!(e, CoreError::SessionChanged) {
                tracing::info!("Session ended during analysis, result discarded");
            }
        })?;
    tracing::info!(
        risk_level = %result.final_recommendation.risk_level,
        department = %result.final_recommendation.department,
        "Triage analysis complete"
    );

    Ok(SubmitOutcome {
        result,
        history_write,
        visit_write,
    })
}

/// Append the history entry and bump the profile visit in the background.
/// The new session count also refreshes the local cache.
fn spawn_writes(
    ctx: &AppContext,
    session: &SessionTicket,
    submission: &TriageSubmission,
    result: &TriageResult,
) -> (PendingWrite<HistoryEntry>, PendingWrite<u32>) {
    let entry = NewHistoryEntry::from_submission(submission, result);
    let store = Arc::clone(&ctx.store);
    let uid = session.uid.clone();
    let history_write = PendingWrite::spawn("history_append", async move {
        store.append_history(&uid, entry).await
    });

    let visit = TriageVisit {
        risk_level: result.final_recommendation.risk_level.clone(),
        at: Utc::now(),
    };
    let demographics = submission.demographics;
    let store = Arc::clone(&ctx.store);
    let state = Arc::clone(&ctx.state);
    let cache = Arc::clone(&ctx.cache);
    let session = session.clone();
    let visit_write = PendingWrite::spawn("record_visit", async move {
        let count = store.record_visit(&session.uid, visit).await?;
        let cached = CachedProfile {
            demographics: Some(demographics),
            session_count: count,
            updated_at: Utc::now(),
        };
        if let Err(e) = cache.save(&session.uid, &cached) {
            tracing::warn!(error = %e, "Could not refresh profile cache");
        }
        match state.with_session(&session, || state.set_session_count(count)) {
            Ok(()) => {}
            Err(CoreError::SessionChanged) => {
                tracing::debug!("Session ended, session count not mirrored");
            }
            Err(e) => tracing::warn!(error = %e, "Could not update session count"),
        }
        Ok(count)
    });

    (history_write, visit_write)
}
