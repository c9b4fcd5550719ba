use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::section::SectionKind;

/// A graded quiz attempt as stored in `quiz_sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSessionRecord {
    pub id: Uuid,
    pub generation_session_id: Uuid,
    pub words: Vec<String>,
    pub score: i64,
    pub max_score: i64,
    pub percentage: f64,
    pub graded_answers: Vec<GradedAnswer>,
    pub duration_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub section: SectionKind,
    pub question_id: i32,
    pub word: String,
    pub prompt: String,
    pub submitted_answer: serde_json::Value,
    pub correct_answer: String,
    pub is_correct: bool,
    pub points_earned: i64,
    pub max_points: i64,
}
