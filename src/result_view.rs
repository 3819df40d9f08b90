//! Display model of a triage result.
//!
//! `render_result` is pure: it never fails and never touches state. Empty
//! sections are left out of the view instead of rendering empty lists, and
//! risk labels map onto a fixed palette with a neutral fallback.

use serde::Serialize;

use crate::models::{RiskLevel, TriageResult, VitalStatus};

// ═══════════════════════════════════════════
// Palette
// ═══════════════════════════════════════════

/// Visual tone of a risk label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTone {
    Low,
    Moderate,
    High,
    Critical,
    /// Label the palette does not know.
    Neutral,
}

/// Palette tokens for a tone. The web shell maps tokens to its theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub text: &'static str,
    pub background: &'static str,
    pub border: &'static str,
}

impl RiskTone {
    /// Case-insensitive lookup of a free-text risk label.
    pub fn for_label(label: &str) -> Self {
        match RiskLevel::classify(label) {
            Some(RiskLevel::Low) => Self::Low,
            Some(RiskLevel::Moderate) => Self::Moderate,
            Some(RiskLevel::High) => Self::High,
            Some(RiskLevel::Critical) => Self::Critical,
            None => Self::Neutral,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Self::Low => Palette {
                text: "green-700",
                background: "green-50",
                border: "green-200",
            },
            Self::Moderate => Palette {
                text: "amber-700",
                background: "amber-50",
                border: "amber-200",
            },
            Self::High => Palette {
                text: "orange-700",
                background: "orange-50",
                border: "orange-200",
            },
            Self::Critical => Palette {
                text: "red-700",
                background: "red-50",
                border: "red-200",
            },
            Self::Neutral => Palette {
                text: "slate-700",
                background: "slate-50",
                border: "slate-200",
            },
        }
    }
}

/// Speed-of-care band for an urgency score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyBand {
    /// 0..=3
    Routine,
    /// 4..=6
    Soon,
    /// 7..=8
    Urgent,
    /// 9..=10
    Immediate,
}

impl UrgencyBand {
    pub fn for_score(score: u8) -> Self {
        match score {
            0..=3 => Self::Routine,
            4..=6 => Self::Soon,
            7..=8 => Self::Urgent,
            _ => Self::Immediate,
        }
    }
}

/// Clamp a service-reported urgency to 0..=10.
pub fn clamp_urgency(score: i32) -> u8 {
    // Lossless: clamped into u8 range first.
    score.clamp(0, 10) as u8
}

/// Fraction in [0,1] as a whole percentage.
pub fn as_percent(fraction: f64) -> u8 {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

// ═══════════════════════════════════════════
// View model
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrgencyView {
    pub score: u8,
    pub band: UrgencyBand,
}

impl UrgencyView {
    fn from_score(raw: i32) -> Self {
        let score = clamp_urgency(raw);
        Self {
            score,
            band: UrgencyBand::for_score(score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationView {
    pub risk_level: String,
    pub tone: RiskTone,
    pub palette: Palette,
    pub department: String,
    pub summary: String,
    pub recommended_action: String,
    pub urgency: UrgencyView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MlView {
    pub risk_level: String,
    pub tone: RiskTone,
    pub department: String,
    pub risk_confidence_pct: u8,
    pub department_confidence_pct: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationView {
    pub risk_level: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_findings: Option<Vec<String>>,
    pub recommended_action: String,
    pub urgency: UrgencyView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalView {
    pub name: String,
    pub value: String,
    pub status: VitalStatus,
    /// 0..=100, rounded.
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentView {
    pub department: String,
    pub wait_time: String,
    pub immediate_action: String,
    pub specialist: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarePlanView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub care_instructions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dietary_recommendations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dietary_restrictions: Option<Vec<String>>,
}

/// Everything the result screen shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub recommendation: RecommendationView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml: Option<MlView>,
    pub explanation: ExplanationView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_factors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vitals: Option<Vec<VitalView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<DepartmentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub care_plan: Option<CarePlanView>,
    /// 0..=100, rounded.
    pub confidence_score: u8,
}

fn non_empty(list: &[String]) -> Option<Vec<String>> {
    if list.is_empty() {
        None
    } else {
        Some(list.to_vec())
    }
}

fn score_0_100(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.clamp(0.0, 100.0).round() as u8
}

/// Build the display model for `result`.
pub fn render_result(result: &TriageResult) -> ResultView {
    let rec = &result.final_recommendation;
    let tone = RiskTone::for_label(&rec.risk_level);

    let recommendation = RecommendationView {
        risk_level: rec.risk_level.clone(),
        tone,
        palette: tone.palette(),
        department: rec.department.clone(),
        summary: rec.summary.clone(),
        recommended_action: rec.recommended_action.clone(),
        urgency: UrgencyView::from_score(rec.urgency_score),
    };

    let ml = result.ml_prediction.as_ref().map(|ml| MlView {
        risk_level: ml.risk_level.clone(),
        tone: RiskTone::for_label(&ml.risk_level),
        department: ml.department.clone(),
        risk_confidence_pct: as_percent(ml.risk_confidence),
        department_confidence_pct: as_percent(ml.department_confidence),
    });

    let ai = &result.ai_explanation;
    let explanation = ExplanationView {
        risk_level: ai.risk_level.clone(),
        summary: ai.summary.clone(),
        key_findings: non_empty(&ai.key_findings),
        recommended_action: ai.recommended_action.clone(),
        urgency: UrgencyView::from_score(ai.urgency_score),
    };

    let vitals = if result.vital_analysis.is_empty() {
        None
    } else {
        Some(
            result
                .vital_analysis
                .iter()
                .map(|v| VitalView {
                    name: v.name.clone(),
                    value: v.value.clone(),
                    status: v.status,
                    score: score_0_100(v.score),
                })
                .collect(),
        )
    };

    let department = result.dept_insights.as_ref().map(|d| DepartmentView {
        department: d.department.clone(),
        wait_time: d.wait_time.clone(),
        immediate_action: d.immediate_action.clone(),
        specialist: d.specialist.clone(),
    });

    let plan = &result.care_plan;
    let care_plan = (!plan.is_empty()).then(|| CarePlanView {
        care_instructions: non_empty(&plan.care_instructions),
        dietary_recommendations: non_empty(&plan.dietary_recommendations),
        dietary_restrictions: non_empty(&plan.dietary_restrictions),
    });

    ResultView {
        recommendation,
        ml,
        explanation,
        risk_factors: non_empty(&result.risk_factors),
        vitals,
        department,
        care_plan,
        confidence_score: score_0_100(result.confidence_score),
    }
}
