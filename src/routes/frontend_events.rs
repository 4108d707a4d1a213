use axum::{extract::State, response::IntoResponse, Json};
use validator::Validate;

use crate::dto::proctoring_dto::LogEventRequest;
use crate::error::Result;
use crate::AppState;

/// Tab switches, copy/paste, devtools and similar signals from the exam page.
#[axum::debug_handler]
pub async fn log_event(
    State(state): State<AppState>,
    Json(payload): Json<LogEventRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let evaluation = state
        .proctoring_service
        .submit_event(payload.attempt_id, payload.event_type.trim())
        .await?;
    Ok(Json(evaluation))
}
