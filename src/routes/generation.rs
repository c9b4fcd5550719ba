use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::generation_dto::CreateGenerationSessionRequest;
use crate::error::{Error, Result};
use crate::models::section::SectionKind;
use crate::AppState;

fn parse_section(raw: u8) -> Result<SectionKind> {
    SectionKind::from_number(raw)
        .ok_or_else(|| Error::BadRequest(format!("Unknown section {}; expected 1, 2 or 3", raw)))
}

#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateGenerationSessionRequest>,
) -> Result<Response> {
    payload.validate()?;
    let session = state.sessions.create(payload.words)?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let session = state.sessions.get(id)?;
    Ok(Json(session).into_response())
}

#[axum::debug_handler]
pub async fn get_section(
    State(state): State<AppState>,
    Path((id, section)): Path<(Uuid, u8)>,
) -> Result<Response> {
    let section = parse_section(section)?;
    let section_state = state.sessions.get_section(id, section)?;
    Ok(Json(section_state).into_response())
}

#[axum::debug_handler]
pub async fn retry_section(
    State(state): State<AppState>,
    Path((id, section)): Path<(Uuid, u8)>,
) -> Result<Response> {
    let section = parse_section(section)?;
    let section_state = state.sessions.retry(id, section)?;
    Ok((StatusCode::ACCEPTED, Json(section_state)).into_response())
}
