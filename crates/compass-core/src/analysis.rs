use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;

/// One step title as presented to the analysis collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepSummary {
    pub title: String,
    pub area: Option<String>,
}

/// The week summary submitted for analysis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeekPayload {
    pub week_dates: String,
    pub completed_steps: Vec<StepSummary>,
    pub failed_steps: Vec<StepSummary>,
    pub mood_avg: Option<f64>,
    pub user_reflection: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestProfile {
    pub name: String,
}

/// Structured request handed to an [`AnalysisProvider`]: a mode tag, the
/// requesting user's profile, and the mode-specific payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub mode: String,
    pub user_profile: RequestProfile,
    pub payload: WeekPayload,
}

impl AnalysisRequest {
    pub fn weekly_review(user_name: Option<&str>, payload: WeekPayload) -> Self {
        Self {
            mode: "weekly_review".to_string(),
            user_profile: RequestProfile {
                name: user_name.unwrap_or("User").to_string(),
            },
            payload,
        }
    }
}

/// Structured analysis produced by the collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAnalysis {
    pub summary: String,
    pub score: i64,
    pub feedback: serde_json::Value,
    pub questions_for_reflection: Vec<String>,
}

/// Seam to the out-of-process AI generation runner. The runner has no
/// contract to complete within any window; callers bound the wait themselves.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze(&self, request: &AnalysisRequest) -> Result<WeeklyAnalysis, GenerationError>;
}
