use axum::{extract::State, response::IntoResponse, Json};
use validator::Validate;

use crate::dto::proctoring_dto::{CaptureFaceRequest, CaptureFaceResponse};
use crate::error::Result;
use crate::services::attempt_service::FACE_REGISTERED;
use crate::AppState;

#[axum::debug_handler]
pub async fn capture_face(
    State(state): State<AppState>,
    Json(payload): Json<CaptureFaceRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state
        .attempt_service
        .capture_face(payload.attempt_id, &payload.image)
        .await?;
    Ok(Json(CaptureFaceResponse {
        status: FACE_REGISTERED.to_string(),
    }))
}
