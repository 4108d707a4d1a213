use crate::database::store::{LogOutcome, ProctorStore};
use crate::error::{Error, Result};
use crate::models::cheating_event::CheatingEvent;
use crate::models::event_weight::{default_weights, DEFAULT_EVENT_WEIGHT};
use crate::models::exam_attempt::{AttemptStanding, AttemptStatus, ExamAttempt};
use crate::services::scoring_service::ScoringService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    attempts: HashMap<Uuid, ExamAttempt>,
    events: Vec<CheatingEvent>,
    weights: HashMap<String, i32>,
    next_event_id: i64,
}

impl MemoryState {
    fn attempt(&self, attempt_id: Uuid) -> Result<&ExamAttempt> {
        self.attempts
            .get(&attempt_id)
            .ok_or_else(|| Error::NotFound(format!("Attempt {} not found", attempt_id)))
    }

    fn attempt_mut(&mut self, attempt_id: Uuid) -> Result<&mut ExamAttempt> {
        self.attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| Error::NotFound(format!("Attempt {} not found", attempt_id)))
    }

    fn weight(&self, event_type: &str) -> i32 {
        self.weights
            .get(event_type)
            .copied()
            .unwrap_or(DEFAULT_EVENT_WEIGHT)
    }
}

/// Process-local store with the same semantics as the Postgres one.
/// Backs the test suite and local runs without `DATABASE_URL`.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let weights = default_weights()
            .into_iter()
            .map(|w| (w.event_type, w.weight))
            .collect();
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                weights,
                next_event_id: 1,
                ..MemoryState::default()
            })),
        }
    }

}

#[async_trait]
impl ProctorStore for MemoryStore {
    async fn create_attempt(
        &self,
        user_id: &str,
        exam_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<ExamAttempt> {
        let attempt = ExamAttempt {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            exam_id: exam_id.to_string(),
            cheating_score: 0,
            status: AttemptStatus::Ongoing.as_str().to_string(),
            face_embedding: None,
            started_at,
            ended_at: None,
        };
        self.state
            .lock()
            .attempts
            .insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<ExamAttempt> {
        self.state.lock().attempt(attempt_id).cloned()
    }

    async fn list_attempts(&self) -> Result<Vec<ExamAttempt>> {
        let mut attempts: Vec<ExamAttempt> = self.state.lock().attempts.values().cloned().collect();
        attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(attempts)
    }

    async fn list_events(&self, attempt_id: Uuid) -> Result<Vec<CheatingEvent>> {
        let state = self.state.lock();
        state.attempt(attempt_id)?;
        Ok(state
            .events
            .iter()
            .filter(|e| e.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn get_score_and_status(&self, attempt_id: Uuid) -> Result<AttemptStanding> {
        let state = self.state.lock();
        let attempt = state.attempt(attempt_id)?;
        Ok(AttemptStanding {
            score: attempt.cheating_score,
            status: attempt.attempt_status()?,
        })
    }

    async fn log_events(
        &self,
        attempt_id: Uuid,
        event_types: &[String],
        at: DateTime<Utc>,
        close_with: Option<AttemptStatus>,
    ) -> Result<LogOutcome> {
        let mut state = self.state.lock();
        let attempt = state.attempt(attempt_id)?;
        let mut status = attempt.attempt_status()?;
        let mut score = attempt.cheating_score;

        if status.is_closed() {
            return Ok(LogOutcome::Skipped(AttemptStanding { score, status }));
        }

        let mut events = Vec::with_capacity(event_types.len());
        for event_type in event_types {
            let weight = state.weight(event_type);
            let event = CheatingEvent {
                id: state.next_event_id,
                attempt_id,
                event_type: event_type.clone(),
                weight,
                created_at: at,
            };
            state.next_event_id += 1;
            score += weight;
            events.push(event);
        }

        state.events.extend(events.iter().cloned());
        let attempt = state.attempt_mut(attempt_id)?;
        attempt.cheating_score = score;
        if let Some(closed) = close_with {
            attempt.status = closed.as_str().to_string();
            status = closed;
        }

        Ok(LogOutcome::Logged {
            events,
            standing: AttemptStanding { score, status },
        })
    }

    async fn set_status(&self, attempt_id: Uuid, status: AttemptStatus) -> Result<bool> {
        let mut state = self.state.lock();
        let attempt = state.attempt_mut(attempt_id)?;
        if attempt.attempt_status()? != AttemptStatus::Ongoing {
            return Ok(false);
        }
        attempt.status = status.as_str().to_string();
        Ok(true)
    }

    async fn end_attempt(&self, attempt_id: Uuid, at: DateTime<Utc>) -> Result<ExamAttempt> {
        let mut state = self.state.lock();
        let attempt = state.attempt_mut(attempt_id)?;
        let current = attempt.attempt_status()?;
        if current.is_closed() {
            return Err(Error::AlreadyTerminal(attempt_id, current.to_string()));
        }
        attempt.status = ScoringService::final_status(attempt.cheating_score)
            .as_str()
            .to_string();
        attempt.ended_at = Some(at);
        Ok(attempt.clone())
    }

    async fn get_embedding(&self, attempt_id: Uuid) -> Result<Option<Vec<f32>>> {
        Ok(self.state.lock().attempt(attempt_id)?.face_embedding.clone())
    }

    async fn set_embedding(&self, attempt_id: Uuid, embedding: &[f32]) -> Result<bool> {
        let mut state = self.state.lock();
        let attempt = state.attempt_mut(attempt_id)?;
        if attempt.face_embedding.is_some() {
            return Ok(false);
        }
        attempt.face_embedding = Some(embedding.to_vec());
        Ok(true)
    }

    async fn flag_abandoned(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let mut state = self.state.lock();
        let mut flagged = Vec::new();
        for attempt in state.attempts.values_mut() {
            if attempt.status == AttemptStatus::Ongoing.as_str()
                && attempt.ended_at.is_none()
                && attempt.started_at < cutoff
            {
                attempt.status = AttemptStatus::Flagged.as_str().to_string();
                flagged.push(attempt.id);
            }
        }
        Ok(flagged)
    }
}
