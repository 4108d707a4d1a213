use axum::{extract::State, response::IntoResponse, Json};
use validator::Validate;

use crate::dto::exam_dto::{EndExamRequest, StartExamRequest};
use crate::error::Result;
use crate::AppState;

#[axum::debug_handler]
pub async fn start_exam(
    State(state): State<AppState>,
    payload: Option<Json<StartExamRequest>>,
) -> Result<impl IntoResponse> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;
    let started = state.attempt_service.start_exam(payload.exam_id).await?;
    Ok(Json(started))
}

#[axum::debug_handler]
pub async fn end_exam(
    State(state): State<AppState>,
    Json(payload): Json<EndExamRequest>,
) -> Result<impl IntoResponse> {
    let ended = state.attempt_service.end_exam(payload.attempt_id).await?;
    Ok(Json(ended))
}
