use serde::{Deserialize, Serialize};
use validator::Validate;

/// Webcam frame as sent by the exam page: base64 or a data URL.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnalyzeFrameRequest {
    pub attempt_id: uuid::Uuid,
    #[validate(length(min = 1))]
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CaptureFaceRequest {
    pub attempt_id: uuid::Uuid,
    #[serde(alias = "frame")]
    #[validate(length(min = 1))]
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureFaceResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LogEventRequest {
    pub attempt_id: uuid::Uuid,
    #[serde(alias = "event")]
    #[validate(length(min = 1, max = 64))]
    pub event_type: String,
}
