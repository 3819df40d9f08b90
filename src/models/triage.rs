use serde::{Deserialize, Serialize};

use super::enums::Gender;

/// Sentinel condition meaning "no pre-existing conditions".
pub const NO_CONDITIONS: &str = "None";

/// Age and gender captured during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: u8,
    pub gender: Gender,
}

/// Vital signs as entered on the triage form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// Free text in `systolic/diastolic` form.
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u16>,
    /// Degrees Celsius, one decimal.
    pub temperature: Option<f32>,
}

impl Vitals {
    pub fn is_complete(&self) -> bool {
        self.blood_pressure.is_some() && self.heart_rate.is_some() && self.temperature.is_some()
    }
}

/// A single uploaded medical report.
#[derive(Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Everything sent to `POST /api/triage/analyze`.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageSubmission {
    pub demographics: Demographics,
    pub symptoms: Vec<String>,
    pub conditions: Vec<String>,
    pub vitals: Vitals,
    pub attachment: Option<Attachment>,
}

impl TriageSubmission {
    /// Text fields of the multipart body, in wire order.
    ///
    /// Optional vitals are left out when absent; the file part is added
    /// separately by the client.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("age", self.demographics.age.to_string()),
            ("gender", self.demographics.gender.as_str().to_string()),
            ("symptoms", self.symptoms.join(", ")),
            ("conditions", self.conditions.join(", ")),
        ];
        if let Some(bp) = &self.vitals.blood_pressure {
            fields.push(("bp", bp.clone()));
        }
        if let Some(hr) = self.vitals.heart_rate {
            fields.push(("heart_rate", hr.to_string()));
        }
        if let Some(temp) = self.vitals.temperature {
            fields.push(("temperature", format!("{temp:.1}")));
        }
        fields
    }
}
