//! Shared handler state and request payloads of the app API.

use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::context::AppContext;
use crate::models::Demographics;
use crate::session::{RestoredProfile, SessionView};
use crate::triage_form::{AttachmentError, FormMode, TriageForm};

/// Handler state: the shared application context.
pub type ApiContext = Arc<AppContext>;

/// Attachment as sent by the web shell.
#[derive(Debug, Deserialize)]
pub struct AttachmentPayload {
    pub file_name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Standard base64 of the file bytes.
    pub data_base64: String,
}

/// `POST /app/triage` body.
#[derive(Debug, Default, Deserialize)]
pub struct TriageRequest {
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub blood_pressure: Option<String>,
    #[serde(default)]
    pub heart_rate: Option<String>,
    #[serde(default)]
    pub temperature: Option<String>,
    #[serde(default)]
    pub attachment: Option<AttachmentPayload>,
}

impl TriageRequest {
    /// Replay the request onto a fresh form.
    ///
    /// Duplicate symptoms collapse; conditions go through the same toggle
    /// rules as the form, so `"None"` stays exclusive.
    pub fn into_form(self, mode: FormMode) -> Result<TriageForm, AttachmentError> {
        let mut form = TriageForm::new(mode);
        for symptom in &self.symptoms {
            if !form.symptoms().iter().any(|s| s == symptom.trim()) {
                form.toggle_symptom(symptom);
            }
        }
        for condition in &self.conditions {
            if !form.conditions().iter().any(|c| c == condition.trim()) {
                form.toggle_condition(condition);
            }
        }
        form.blood_pressure = self.blood_pressure.unwrap_or_default();
        form.heart_rate = self.heart_rate.unwrap_or_default();
        form.temperature = self.temperature.unwrap_or_default();

        if let Some(file) = self.attachment {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(file.data_base64.trim())
                .map_err(|_| AttachmentError::Unreadable)?;
            form.attach(&file.file_name, file.mime_type.as_deref(), bytes)?;
        }
        Ok(form)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: ChatMessage,
}

#[derive(Debug, Serialize)]
pub struct OnboardingResponse {
    pub demographics: Demographics,
    pub saved_remotely: bool,
}

#[derive(Debug, Serialize)]
pub struct SignedInResponse {
    pub restored: RestoredProfile,
    pub session: SessionView,
}
