pub mod enums;
pub mod history;
pub mod result;
pub mod triage;

pub use enums::{EnumParseError, Gender, RiskLevel, VitalStatus};
pub use history::{HistoryEntry, NewHistoryEntry, UserProfile};
pub use result::{
    AiExplanation, CarePlan, ChatReply, DeptInsights, FinalRecommendation, MlPrediction,
    ServiceStatus, TriageResult, VitalAnalysis,
};
pub use triage::{Attachment, Demographics, TriageSubmission, Vitals, NO_CONDITIONS};
