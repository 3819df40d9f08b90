use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Gender;
use super::result::TriageResult;
use super::triage::{Demographics, TriageSubmission};

/// One persisted triage submission. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub symptoms: Vec<String>,
    pub conditions: Vec<String>,
    pub risk_level: String,
    pub department: String,
    pub summary: String,
    pub recommended_action: String,
    pub urgency_score: i32,
    /// Assigned by the store when the entry is appended.
    pub timestamp: DateTime<Utc>,
}

/// History entry before the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub symptoms: Vec<String>,
    pub conditions: Vec<String>,
    pub risk_level: String,
    pub department: String,
    pub summary: String,
    pub recommended_action: String,
    pub urgency_score: i32,
}

impl NewHistoryEntry {
    /// Snapshot a successful submission with its authoritative recommendation.
    pub fn from_submission(submission: &TriageSubmission, result: &TriageResult) -> Self {
        let rec = &result.final_recommendation;
        Self {
            symptoms: submission.symptoms.clone(),
            conditions: submission.conditions.clone(),
            risk_level: rec.risk_level.clone(),
            department: rec.department.clone(),
            summary: rec.summary.clone(),
            recommended_action: rec.recommended_action.clone(),
            urgency_score: rec.urgency_score,
        }
    }

    pub fn into_entry(self, id: Uuid, timestamp: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            id,
            symptoms: self.symptoms,
            conditions: self.conditions,
            risk_level: self.risk_level,
            department: self.department,
            summary: self.summary,
            recommended_action: self.recommended_action,
            urgency_score: self.urgency_score,
            timestamp,
        }
    }
}

/// Per-user profile document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    #[serde(default)]
    pub session_count: u32,
    pub last_triage_date: Option<DateTime<Utc>>,
    pub last_risk_level: Option<String>,
}

impl UserProfile {
    /// Demographics, when both halves were saved.
    pub fn demographics(&self) -> Option<Demographics> {
        match (self.age, self.gender) {
            (Some(age), Some(gender)) => Some(Demographics { age, gender }),
            _ => None,
        }
    }
}

/// Sort newest first. Stable for equal timestamps.
pub fn sort_newest_first(entries: &mut [HistoryEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::result::fixtures::full_result;
    use crate::models::triage::Vitals;
    use chrono::TimeZone;

    #[test]
    fn snapshot_uses_final_recommendation() {
        let submission = TriageSubmission {
            demographics: Demographics { age: 61, gender: Gender::Male },
            symptoms: vec!["Chest pain".into()],
            conditions: vec!["Hypertension".into()],
            vitals: Vitals::default(),
            attachment: None,
        };
        let mut result = full_result();
        result.ai_explanation.risk_level = "Moderate".into();

        let entry = NewHistoryEntry::from_submission(&submission, &result);
        assert_eq!(entry.risk_level, "High");
        assert_eq!(entry.department, "Cardiology");
        assert_eq!(entry.symptoms, vec!["Chest pain"]);
        assert_eq!(entry.urgency_score, 9);
    }

    #[test]
    fn profile_uses_camel_case_keys() {
        let profile = UserProfile {
            age: Some(40),
            gender: Some(Gender::Other),
            session_count: 3,
            last_triage_date: None,
            last_risk_level: Some("Low".into()),
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["sessionCount"], 3);
        assert_eq!(json["lastRiskLevel"], "Low");
        assert!(json.get("session_count").is_none());
    }

    #[test]
    fn demographics_require_both_fields() {
        let mut profile = UserProfile { age: Some(40), ..Default::default() };
        assert!(profile.demographics().is_none());
        profile.gender = Some(Gender::Female);
        assert_eq!(
            profile.demographics(),
            Some(Demographics { age: 40, gender: Gender::Female })
        );
    }

    #[test]
    fn sort_puts_newest_first() {
        let t1 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let base = NewHistoryEntry {
            symptoms: vec![],
            conditions: vec![],
            risk_level: "Low".into(),
            department: "General Medicine".into(),
            summary: String::new(),
            recommended_action: String::new(),
            urgency_score: 1,
        };
        let older = base.clone().into_entry(Uuid::new_v4(), t1);
        let newer = base.into_entry(Uuid::new_v4(), t2);

        let mut entries = vec![older.clone(), newer.clone()];
        sort_newest_first(&mut entries);
        assert_eq!(entries[0].id, newer.id);
        assert_eq!(entries[1].id, older.id);
    }
}
