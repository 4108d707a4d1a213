use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CheatingEvent {
    pub id: i64,
    pub attempt_id: Uuid,
    pub event_type: String,
    pub weight: i32,
    pub created_at: DateTime<Utc>,
}

/// Event tags produced by the frame pipeline. Browser events use free-form tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    NoFace,
    MultipleFaces,
    LookingLeft,
    LookingRight,
    GazeLeft,
    GazeRight,
    PhoneDetected,
    FaceMismatch,
    IdentityMismatchWarning,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NoFace => "NO_FACE",
            EventKind::MultipleFaces => "MULTIPLE_FACES",
            EventKind::LookingLeft => "LOOKING_LEFT",
            EventKind::LookingRight => "LOOKING_RIGHT",
            EventKind::GazeLeft => "GAZE_LEFT",
            EventKind::GazeRight => "GAZE_RIGHT",
            EventKind::PhoneDetected => "PHONE_DETECTED",
            EventKind::FaceMismatch => "FACE_MISMATCH",
            EventKind::IdentityMismatchWarning => "IDENTITY_MISMATCH_WARNING",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
