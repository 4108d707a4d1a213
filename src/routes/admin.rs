use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::Result;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_attempts(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let attempts = state.attempt_service.list_attempts().await?;
    Ok(Json(attempts))
}

#[axum::debug_handler]
pub async fn attempt_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let details = state.attempt_service.attempt_details(id).await?;
    Ok(Json(details))
}
