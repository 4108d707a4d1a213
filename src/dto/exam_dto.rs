use crate::models::exam_attempt::AttemptStatus;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_EXAM_ID: &str = "ai_exam_1";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct StartExamRequest {
    #[validate(length(min = 1, max = 100))]
    pub exam_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartExamResponse {
    pub attempt_id: uuid::Uuid,
    pub student_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndExamRequest {
    pub attempt_id: uuid::Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndExamResponse {
    pub status: AttemptStatus,
    pub score: i32,
}
