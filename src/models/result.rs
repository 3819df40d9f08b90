use serde::{Deserialize, Serialize};

use super::enums::VitalStatus;

/// Response of `POST /api/triage/analyze`.
///
/// `final_recommendation` is the authoritative value; `ml_prediction` is
/// advisory and may be null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    #[serde(default)]
    pub ml_prediction: Option<MlPrediction>,
    pub ai_explanation: AiExplanation,
    pub final_recommendation: FinalRecommendation,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub vital_analysis: Vec<VitalAnalysis>,
    #[serde(default)]
    pub dept_insights: Option<DeptInsights>,
    #[serde(default)]
    pub care_plan: CarePlan,
    #[serde(default)]
    pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlPrediction {
    pub risk_level: String,
    pub department: String,
    /// 0..=1
    pub risk_confidence: f64,
    /// 0..=1
    pub department_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiExplanation {
    pub risk_level: String,
    pub summary: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    pub recommended_action: String,
    pub urgency_score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRecommendation {
    pub risk_level: String,
    pub department: String,
    pub summary: String,
    pub recommended_action: String,
    pub urgency_score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalAnalysis {
    pub name: String,
    pub value: String,
    pub status: VitalStatus,
    /// 0..=100
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeptInsights {
    pub department: String,
    pub wait_time: String,
    pub immediate_action: String,
    pub specialist: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarePlan {
    #[serde(default)]
    pub care_instructions: Vec<String>,
    #[serde(default)]
    pub dietary_recommendations: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
}

impl CarePlan {
    pub fn is_empty(&self) -> bool {
        self.care_instructions.is_empty()
            && self.dietary_recommendations.is_empty()
            && self.dietary_restrictions.is_empty()
    }
}

/// Response of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// Response of `GET /` on the triage service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A complete result with every section populated.
    pub fn full_result() -> TriageResult {
        TriageResult {
            ml_prediction: Some(MlPrediction {
                risk_level: "High".into(),
                department: "Cardiology".into(),
                risk_confidence: 0.87,
                department_confidence: 0.742,
            }),
            ai_explanation: AiExplanation {
                risk_level: "High".into(),
                summary: "Chest pressure with tachycardia.".into(),
                key_findings: vec!["Heart rate 118 bpm".into(), "Radiating pain".into()],
                recommended_action: "Go to the emergency department now.".into(),
                urgency_score: 9,
            },
            final_recommendation: FinalRecommendation {
                risk_level: "High".into(),
                department: "Cardiology".into(),
                summary: "Possible acute coronary syndrome.".into(),
                recommended_action: "Seek emergency care immediately.".into(),
                urgency_score: 9,
            },
            risk_factors: vec!["Age over 60".into(), "Hypertension".into()],
            vital_analysis: vec![VitalAnalysis {
                name: "Heart Rate".into(),
                value: "118 bpm".into(),
                status: VitalStatus::Critical,
                score: 22.0,
            }],
            dept_insights: Some(DeptInsights {
                department: "Cardiology".into(),
                wait_time: "Immediate".into(),
                immediate_action: "Chew aspirin if not allergic".into(),
                specialist: "Interventional cardiologist".into(),
            }),
            care_plan: CarePlan {
                care_instructions: vec!["Do not drive yourself".into()],
                dietary_recommendations: vec!["Low sodium".into()],
                dietary_restrictions: vec![],
            },
            confidence_score: 84.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_nested_contract() {
        let json = r#"{
            "ml_prediction": null,
            "ai_explanation": {
                "risk_level": "Low",
                "summary": "Mild cold symptoms.",
                "key_findings": [],
                "recommended_action": "Rest and fluids.",
                "urgency_score": 2
            },
            "final_recommendation": {
                "risk_level": "Low",
                "department": "General Medicine",
                "summary": "Likely viral infection.",
                "recommended_action": "Rest and fluids.",
                "urgency_score": 2
            },
            "risk_factors": [],
            "vital_analysis": [
                {"name": "Temperature", "value": "37.4 °C", "status": "normal", "score": 92}
            ],
            "dept_insights": null,
            "care_plan": {"care_instructions": ["Hydrate"]},
            "confidence_score": 71.5
        }"#;
        let result: TriageResult = serde_json::from_str(json).unwrap();
        assert!(result.ml_prediction.is_none());
        assert_eq!(result.final_recommendation.department, "General Medicine");
        assert_eq!(result.vital_analysis[0].status, VitalStatus::Normal);
        assert_eq!(result.care_plan.care_instructions, vec!["Hydrate"]);
        assert!(result.care_plan.dietary_restrictions.is_empty());
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let json = r#"{
            "ai_explanation": {
                "risk_level": "Low", "summary": "s",
                "recommended_action": "a", "urgency_score": 1
            },
            "final_recommendation": {
                "risk_level": "Low", "department": "General Medicine",
                "summary": "s", "recommended_action": "a", "urgency_score": 1
            }
        }"#;
        let result: TriageResult = serde_json::from_str(json).unwrap();
        assert!(result.risk_factors.is_empty());
        assert!(result.ai_explanation.key_findings.is_empty());
        assert!(result.care_plan.is_empty());
        assert!(result.ml_prediction.is_none());
    }

    #[test]
    fn legacy_flat_shape_is_rejected() {
        let json = r#"{
            "risk_level": "Medium",
            "department": "General Medicine",
            "explanation": "AI Model is currently pending integration."
        }"#;
        assert!(serde_json::from_str::<TriageResult>(json).is_err());
    }

    #[test]
    fn care_plan_emptiness() {
        assert!(CarePlan::default().is_empty());
        assert!(!fixtures::full_result().care_plan.is_empty());
    }
}
