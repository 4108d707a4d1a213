use crate::models::cheating_event::CheatingEvent;
use crate::models::exam_attempt::ExamAttempt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub id: uuid::Uuid,
    pub user_id: String,
    pub exam_id: String,
    pub cheating_score: i32,
    pub status: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ExamAttempt> for AttemptSummary {
    fn from(attempt: ExamAttempt) -> Self {
        Self {
            id: attempt.id,
            user_id: attempt.user_id,
            exam_id: attempt.exam_id,
            cheating_score: attempt.cheating_score,
            status: attempt.status,
            started_at: attempt.started_at,
            ended_at: attempt.ended_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub event_type: String,
    pub weight: i32,
    pub score_after: i32,
    pub time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptDetails {
    pub attempt: AttemptSummary,
    pub events: Vec<TimelineEntry>,
}

impl AttemptDetails {
    /// Events must be in insertion order.
    pub fn new(attempt: ExamAttempt, events: Vec<CheatingEvent>) -> Self {
        let mut running = 0;
        let timeline: Vec<TimelineEntry> = events
            .into_iter()
            .map(|event| {
                running += event.weight;
                TimelineEntry {
                    event_type: event.event_type,
                    weight: event.weight,
                    score_after: running,
                    time: event.created_at,
                }
            })
            .collect();
        Self {
            attempt: attempt.into(),
            events: timeline,
        }
    }
}
