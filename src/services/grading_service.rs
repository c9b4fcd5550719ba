use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::dto::quiz_dto::SubmittedAnswer;
use crate::models::question::{QuestionDetails, QuizQuestion};
use crate::models::quiz_session::GradedAnswer;
use crate::models::section::{SectionKind, SectionStatus};
use crate::services::generation_session::GenerationSession;
use crate::utils::text::fold;

const POINTS_PER_QUESTION: i64 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct GradeSummary {
    pub score: i64,
    pub max_score: i64,
    pub percentage: f64,
    pub graded: Vec<GradedAnswer>,
}

pub struct GradingService;

impl GradingService {
    /// Grades every question of the session's ready sections. Questions
    /// without a submitted answer earn nothing.
    pub fn grade(session: &GenerationSession, answers: &[SubmittedAnswer]) -> GradeSummary {
        let mut score = 0;
        let mut max_score = 0;
        let mut graded = Vec::new();

        for state in session.sections.iter() {
            if state.status != SectionStatus::Ready {
                continue;
            }
            for question in &state.questions {
                let submitted = answers
                    .iter()
                    .find(|a| a.section == state.section && a.question_id == question.id)
                    .map(|a| a.answer.clone())
                    .unwrap_or(JsonValue::Null);

                let entry = grade_question(state.section, question, submitted);
                score += entry.points_earned;
                max_score += entry.max_points;
                graded.push(entry);
            }
        }

        GradeSummary {
            score,
            max_score,
            percentage: percentage(score, max_score),
            graded,
        }
    }
}

fn grade_question(section: SectionKind, question: &QuizQuestion, submitted: JsonValue) -> GradedAnswer {
    let (is_correct, correct_answer) = match &question.details {
        QuestionDetails::MultipleChoice(mc) => {
            let given = submitted
                .as_u64()
                .or_else(|| submitted.get("selected").and_then(|v| v.as_u64()));
            (
                given == Some(mc.correct_index as u64),
                mc.correct_choice().unwrap_or_default().to_string(),
            )
        }
        QuestionDetails::FillIn(fill) => {
            let given = submitted
                .as_str()
                .or_else(|| submitted.get("text").and_then(|v| v.as_str()));
            (
                given.map(|g| fold(g) == fold(&fill.answer)).unwrap_or(false),
                fill.answer.clone(),
            )
        }
    };

    GradedAnswer {
        section,
        question_id: question.id,
        word: question.word.clone(),
        prompt: question.prompt.clone(),
        submitted_answer: submitted,
        correct_answer,
        is_correct,
        points_earned: if is_correct { POINTS_PER_QUESTION } else { 0 },
        max_points: POINTS_PER_QUESTION,
    }
}

fn percentage(score: i64, max_score: i64) -> f64 {
    if max_score <= 0 {
        return 0.0;
    }
    ((score as f64 / max_score as f64) * 10_000.0).round() / 100.0
}
