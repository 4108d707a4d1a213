pub mod admin;
pub mod exam;
pub mod face_auth;
pub mod frontend_events;
pub mod health;
pub mod proctoring;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    auth::{require_admin_key, AdminKey},
    cors::permissive_cors,
    rate_limit::{new_rps_state, rps_middleware},
};
use crate::AppState;

/// Webcam frames are a few hundred KB as base64; leave room for high-res captures.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RouterLimits {
    pub frame_rps: u32,
    pub public_rps: u32,
    pub admin_api_key: Option<String>,
}

pub fn router(state: AppState, limits: RouterLimits) -> Router {
    let base_routes = Router::new().route("/health", get(health::health));

    let frame_api = Router::new()
        .route("/analyze-frame", post(proctoring::analyze_frame))
        .route("/capture-face", post(face_auth::capture_face))
        .layer(axum::middleware::from_fn_with_state(
            new_rps_state(limits.frame_rps),
            rps_middleware,
        ));

    let public_api = Router::new()
        .route("/start-exam", post(exam::start_exam))
        .route("/end-exam", post(exam::end_exam))
        .route("/log-event", post(frontend_events::log_event))
        .layer(axum::middleware::from_fn_with_state(
            new_rps_state(limits.public_rps),
            rps_middleware,
        ));

    let admin_api = Router::new()
        .route("/admin/attempts", get(admin::list_attempts))
        .route("/admin/attempts/:id", get(admin::attempt_details))
        .route("/admin/attempt/:id/details", get(admin::attempt_details))
        .layer(axum::middleware::from_fn_with_state(
            AdminKey::new(limits.admin_api_key),
            require_admin_key,
        ));

    base_routes
        .merge(frame_api)
        .merge(public_api)
        .merge(admin_api)
        .with_state(state)
        .layer(permissive_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
