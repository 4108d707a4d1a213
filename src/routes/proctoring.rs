use axum::{extract::State, response::IntoResponse, Json};
use validator::Validate;

use crate::dto::proctoring_dto::AnalyzeFrameRequest;
use crate::error::Result;
use crate::AppState;

#[axum::debug_handler]
pub async fn analyze_frame(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzeFrameRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let report = state
        .proctoring_service
        .submit_frame(payload.attempt_id, &payload.image)
        .await?;
    Ok(Json(report))
}
