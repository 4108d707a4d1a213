use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamAttempt {
    pub id: Uuid,
    pub user_id: String,
    pub exam_id: String,
    pub cheating_score: i32,
    pub status: String,
    #[serde(skip_serializing)]
    pub face_embedding: Option<Vec<f32>>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ExamAttempt {
    pub fn attempt_status(&self) -> crate::error::Result<AttemptStatus> {
        self.status.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Ongoing,
    Terminated,
    Completed,
    Flagged,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::Ongoing => "ONGOING",
            AttemptStatus::Terminated => "TERMINATED",
            AttemptStatus::Completed => "COMPLETED",
            AttemptStatus::Flagged => "FLAGGED",
        }
    }

    /// Closed attempts accept no further cheating events.
    pub fn is_closed(self) -> bool {
        matches!(self, AttemptStatus::Terminated | AttemptStatus::Completed)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONGOING" => Ok(AttemptStatus::Ongoing),
            "TERMINATED" => Ok(AttemptStatus::Terminated),
            "COMPLETED" => Ok(AttemptStatus::Completed),
            "FLAGGED" => Ok(AttemptStatus::Flagged),
            other => Err(crate::error::Error::Internal(format!(
                "Unknown attempt status '{}'",
                other
            ))),
        }
    }
}

/// Score and status as read inside a critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptStanding {
    pub score: i32,
    pub status: AttemptStatus,
}
