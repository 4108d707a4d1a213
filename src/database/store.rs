use crate::error::Result;
use crate::models::cheating_event::CheatingEvent;
use crate::models::exam_attempt::{AttemptStanding, AttemptStatus, ExamAttempt};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Result of appending one frame's events.
#[derive(Debug, Clone, PartialEq)]
pub enum LogOutcome {
    Logged {
        events: Vec<CheatingEvent>,
        standing: AttemptStanding,
    },
    /// The attempt was already closed; nothing was written.
    Skipped(AttemptStanding),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProctorStore: Send + Sync {
    async fn create_attempt(
        &self,
        user_id: &str,
        exam_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<ExamAttempt>;

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<ExamAttempt>;

    /// Newest first.
    async fn list_attempts(&self) -> Result<Vec<ExamAttempt>>;

    /// Oldest first.
    async fn list_events(&self, attempt_id: Uuid) -> Result<Vec<CheatingEvent>>;

    async fn get_score_and_status(&self, attempt_id: Uuid) -> Result<AttemptStanding>;

    /// Appends every event with its weight (1 when the type has none) and adds the weights to
    /// the score, all or nothing. `close_with` moves the attempt to that
    /// status in the same write. Closed attempts are skipped.
    async fn log_events(
        &self,
        attempt_id: Uuid,
        event_types: &[String],
        at: DateTime<Utc>,
        close_with: Option<AttemptStatus>,
    ) -> Result<LogOutcome>;

    /// Moves an ONGOING attempt to `status`. Returns false when the attempt
    /// had already left ONGOING.
    async fn set_status(&self, attempt_id: Uuid, status: AttemptStatus) -> Result<bool>;

    /// Ends an ONGOING or FLAGGED attempt with the status its score earns.
    async fn end_attempt(&self, attempt_id: Uuid, at: DateTime<Utc>) -> Result<ExamAttempt>;

    async fn get_embedding(&self, attempt_id: Uuid) -> Result<Option<Vec<f32>>>;

    /// Write-once. Returns false when an embedding was already stored.
    async fn set_embedding(&self, attempt_id: Uuid, embedding: &[f32]) -> Result<bool>;

    /// Flags ONGOING attempts without an end time that started before `cutoff`.
    async fn flag_abandoned(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>>;
}
