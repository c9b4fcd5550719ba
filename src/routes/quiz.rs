use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::quiz_dto::{HistoryQuery, SubmitQuizRequest};
use crate::error::{Error, Result};
use crate::services::grading_service::GradingService;
use crate::services::history_service::NewQuizSession;
use crate::AppState;

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

/// Grades answers against a live generation session and stores the result.
#[axum::debug_handler]
pub async fn submit_quiz(
    State(state): State<AppState>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<Response> {
    payload.validate()?;

    let session = state.sessions.get(payload.generation_session_id)?;
    if !session.is_settled() {
        return Err(Error::Conflict(
            "Quiz generation is still in progress for this session".to_string(),
        ));
    }

    let summary = GradingService::grade(&session, &payload.answers);
    let record = state
        .history_service
        .record(NewQuizSession {
            generation_session_id: session.id,
            words: session.words,
            summary,
            duration_seconds: payload.duration_seconds,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(record)).into_response())
}

#[axum::debug_handler]
pub async fn list_quiz_sessions(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);

    let result = state.history_service.list(page, per_page).await?;
    Ok(Json(result).into_response())
}

#[axum::debug_handler]
pub async fn get_quiz_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let record = state.history_service.get(id).await?;
    Ok(Json(record).into_response())
}

#[axum::debug_handler]
pub async fn delete_quiz_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if state.history_service.delete(id).await? {
        tracing::info!(quiz_session_id = %id, "quiz session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound(format!("Quiz session {} not found", id)))
    }
}
