use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::section::SectionKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub section: SectionKind,
    pub question_id: i32,
    /// A choice index (or `{"selected": n}`) for multiple choice, text for fill-in.
    pub answer: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    pub generation_session_id: Uuid,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
    #[validate(range(min = 0, max = 86400))]
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
