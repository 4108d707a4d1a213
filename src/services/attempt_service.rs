use crate::database::store::ProctorStore;
use crate::dto::admin_dto::{AttemptDetails, AttemptSummary};
use crate::dto::exam_dto::{EndExamResponse, StartExamResponse, DEFAULT_EXAM_ID};
use crate::error::{Error, Result};
use crate::services::debounce_service::DebounceService;
use crate::services::detector_service::FrameDetector;
use crate::utils::image::decode_frame;
use crate::utils::time::Clock;
use crate::utils::token::generate_student_id;
use chrono::Duration;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const FACE_REGISTERED: &str = "FACE_REGISTERED";

#[derive(Clone)]
pub struct AttemptService {
    store: Arc<dyn ProctorStore>,
    detector: Arc<dyn FrameDetector>,
    debounce: DebounceService,
    clock: Arc<dyn Clock>,
    abandon_after: Duration,
}

impl AttemptService {
    pub fn new(
        store: Arc<dyn ProctorStore>,
        detector: Arc<dyn FrameDetector>,
        debounce: DebounceService,
        clock: Arc<dyn Clock>,
        abandon_after: Duration,
    ) -> Self {
        Self {
            store,
            detector,
            debounce,
            clock,
            abandon_after,
        }
    }

    pub async fn start_exam(&self, exam_id: Option<String>) -> Result<StartExamResponse> {
        let student_id = generate_student_id();
        let exam_id = exam_id.unwrap_or_else(|| DEFAULT_EXAM_ID.to_string());
        let attempt = self
            .store
            .create_attempt(&student_id, &exam_id, self.clock.now())
            .await?;
        info!(attempt_id = %attempt.id, %student_id, %exam_id, "exam started");
        Ok(StartExamResponse {
            attempt_id: attempt.id,
            student_id,
        })
    }

    pub async fn end_exam(&self, attempt_id: Uuid) -> Result<EndExamResponse> {
        let handle = self.debounce.tracker(attempt_id);
        let ended = {
            let _guard = handle.lock().await;
            self.store.end_attempt(attempt_id, self.clock.now()).await
        };
        self.debounce.forget(attempt_id);

        let attempt = ended?;
        info!(%attempt_id, status = %attempt.status, score = attempt.cheating_score, "exam ended");
        Ok(EndExamResponse {
            status: attempt.attempt_status()?,
            score: attempt.cheating_score,
        })
    }

    /// Stores the reference embedding identity checks compare against.
    pub async fn capture_face(&self, attempt_id: Uuid, image: &str) -> Result<()> {
        let frame = decode_frame(image)?;

        let standing = self.store.get_score_and_status(attempt_id).await?;
        if standing.status.is_closed() {
            return Err(Error::AlreadyTerminal(attempt_id, standing.status.to_string()));
        }

        let capture = self.detector.face_embedding(&frame).await?;
        match capture.face_count {
            0 => return Err(Error::BadRequest("No face detected".to_string())),
            1 => {}
            _ => return Err(Error::BadRequest("Multiple faces detected".to_string())),
        }
        if !capture.face_clear {
            return Err(Error::BadRequest(
                "Face is obstructed, remove any mask or covering".to_string(),
            ));
        }
        let embedding = capture
            .embedding
            .ok_or_else(|| Error::Detector("no embedding produced for face".to_string()))?;

        if !self.store.set_embedding(attempt_id, &embedding).await? {
            return Err(Error::BadRequest("Face already registered".to_string()));
        }
        info!(%attempt_id, dims = embedding.len(), "face registered");
        Ok(())
    }

    pub async fn list_attempts(&self) -> Result<Vec<AttemptSummary>> {
        self.sweep_abandoned().await?;
        let attempts = self.store.list_attempts().await?;
        Ok(attempts.into_iter().map(AttemptSummary::from).collect())
    }

    pub async fn attempt_details(&self, attempt_id: Uuid) -> Result<AttemptDetails> {
        let attempt = self.store.get_attempt(attempt_id).await?;
        let events = self.store.list_events(attempt_id).await?;
        Ok(AttemptDetails::new(attempt, events))
    }

    /// Flags ONGOING attempts that started longer ago than the abandon window.
    /// Flagged attempts stay open, so their trackers are kept.
    pub async fn sweep_abandoned(&self) -> Result<Vec<Uuid>> {
        let cutoff = self.clock.now() - self.abandon_after;
        let flagged = self.store.flag_abandoned(cutoff).await?;
        if !flagged.is_empty() {
            info!(count = flagged.len(), %cutoff, "abandoned attempts flagged");
        }
        Ok(flagged)
    }
}
