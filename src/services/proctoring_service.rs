use crate::database::store::{LogOutcome, ProctorStore};
use crate::error::Result;
use crate::models::exam_attempt::{AttemptStanding, AttemptStatus};
use crate::models::observation::{Direction, Observation};
use crate::services::debounce_service::DebounceService;
use crate::services::detector_service::{cosine_distance, FrameDetector};
use crate::services::scoring_service::{Evaluation, ScoringService};
use crate::utils::image::decode_frame;
use crate::utils::time::Clock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub faces_detected: u32,
    pub direction: Direction,
    pub gaze: Direction,
    pub phone_detected: bool,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

impl FrameReport {
    /// Directions read CENTER unless exactly one face was seen.
    fn new(observation: &Observation, evaluation: Evaluation) -> Self {
        let (direction, gaze) = if observation.face_count == 1 {
            (observation.head_direction, observation.gaze_direction)
        } else {
            (Direction::Center, Direction::Center)
        };
        Self {
            faces_detected: observation.face_count,
            direction,
            gaze,
            phone_detected: observation.phone_present,
            evaluation,
        }
    }
}

/// Runs webcam frames and browser events through detection, debouncing,
/// persistence and scoring.
#[derive(Clone)]
pub struct ProctoringService {
    store: Arc<dyn ProctorStore>,
    detector: Arc<dyn FrameDetector>,
    debounce: DebounceService,
    clock: Arc<dyn Clock>,
}

impl ProctoringService {
    pub fn new(
        store: Arc<dyn ProctorStore>,
        detector: Arc<dyn FrameDetector>,
        debounce: DebounceService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            detector,
            debounce,
            clock,
        }
    }

    pub async fn submit_frame(&self, attempt_id: Uuid, image: &str) -> Result<FrameReport> {
        let frame = decode_frame(image)?;
        let reference = self.store.get_embedding(attempt_id).await?;

        // Detection runs outside the per-attempt lock.
        let (geometry, phone_present) = tokio::try_join!(
            self.detector.face_geometry(&frame),
            self.detector.phone_present(&frame),
        )?;

        let identity_distance = match reference.as_deref() {
            Some(reference) if geometry.face_count == 1 => {
                let capture = self.detector.face_embedding(&frame).await?;
                capture
                    .embedding
                    .as_deref()
                    .and_then(|live| cosine_distance(reference, live))
            }
            _ => None,
        };

        let observation = Observation {
            face_count: geometry.face_count,
            head_direction: geometry.head_direction,
            gaze_direction: geometry.gaze_direction,
            phone_present,
            identity_distance,
        };

        let handle = self.debounce.tracker(attempt_id);
        let mut live = handle.lock().await;

        let standing = self.store.get_score_and_status(attempt_id).await?;
        if standing.status.is_closed() {
            debug!(%attempt_id, status = %standing.status, "frame for closed attempt ignored");
            self.debounce.forget(attempt_id);
            return Ok(FrameReport::new(&observation, Evaluation::default()));
        }

        let now = self.clock.now();
        let mut next = live.clone();
        let verdict = next.observe(&observation, now, self.debounce.policy());

        let standing = if verdict.is_empty() {
            standing
        } else {
            let event_types: Vec<String> = verdict
                .events
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect();
            let close_with = verdict.terminate.then_some(AttemptStatus::Terminated);
            let outcome = self
                .store
                .log_events(attempt_id, &event_types, now, close_with)
                .await?;
            match outcome {
                LogOutcome::Logged { events, standing } => {
                    for event in &events {
                        info!(
                            %attempt_id,
                            event_type = %event.event_type,
                            weight = event.weight,
                            score = standing.score,
                            "cheating event logged"
                        );
                    }
                    standing
                }
                LogOutcome::Skipped(standing) => {
                    debug!(%attempt_id, status = %standing.status, "events skipped for closed attempt");
                    self.debounce.forget(attempt_id);
                    return Ok(FrameReport::new(&observation, Evaluation::default()));
                }
            }
        };

        *live = next;

        if verdict.terminate {
            warn!(%attempt_id, score = standing.score, "attempt terminated on identity mismatch");
            self.debounce.forget(attempt_id);
            return Ok(FrameReport::new(&observation, Evaluation::terminated()));
        }

        let evaluation = self.escalate(attempt_id, standing).await?;
        Ok(FrameReport::new(&observation, evaluation))
    }

    /// Logs a browser-side event once, with no debouncing.
    pub async fn submit_event(&self, attempt_id: Uuid, event_type: &str) -> Result<Evaluation> {
        let standing = self.store.get_score_and_status(attempt_id).await?;
        if standing.status.is_closed() {
            debug!(%attempt_id, event_type, "browser event for closed attempt ignored");
            return Ok(Evaluation::default());
        }

        let handle = self.debounce.tracker(attempt_id);
        let _guard = handle.lock().await;

        let outcome = self
            .store
            .log_events(attempt_id, &[event_type.to_string()], self.clock.now(), None)
            .await?;
        match outcome {
            LogOutcome::Logged { events, standing } => {
                for event in &events {
                    info!(
                        %attempt_id,
                        event_type = %event.event_type,
                        weight = event.weight,
                        score = standing.score,
                        "browser event logged"
                    );
                }
                self.escalate(attempt_id, standing).await
            }
            LogOutcome::Skipped(_) => Ok(Evaluation::default()),
        }
    }

    async fn escalate(&self, attempt_id: Uuid, standing: AttemptStanding) -> Result<Evaluation> {
        let mut evaluation = ScoringService::evaluate(standing.score, standing.status);
        if evaluation.status == Some(AttemptStatus::Terminated) {
            if self
                .store
                .set_status(attempt_id, AttemptStatus::Terminated)
                .await?
            {
                warn!(%attempt_id, score = standing.score, "attempt terminated by score");
                self.debounce.forget(attempt_id);
            } else {
                evaluation.status = None;
            }
        }
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_store::MemoryStore;
    use crate::database::store::MockProctorStore;
    use crate::error::Error;
    use crate::services::debounce_service::DebouncePolicy;
    use crate::services::detector_service::{FaceCapture, FaceGeometry, MockFrameDetector};
    use crate::services::scoring_service::WarningTier;
    use crate::utils::time::ManualClock;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use chrono::{Duration, TimeZone, Utc};

    fn jpeg() -> String {
        format!(
            "data:image/jpeg;base64,{}",
            STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
        )
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ))
    }

    fn detector(faces: u32, phone: bool, embedding: Option<Vec<f32>>) -> MockFrameDetector {
        let mut detector = MockFrameDetector::new();
        detector.expect_face_geometry().returning(move |_| {
            Ok(FaceGeometry {
                face_count: faces,
                ..FaceGeometry::default()
            })
        });
        detector
            .expect_phone_present()
            .returning(move |_| Ok(phone));
        detector.expect_face_embedding().returning(move |_| {
            Ok(FaceCapture {
                face_count: 1,
                face_clear: true,
                embedding: embedding.clone(),
            })
        });
        detector
    }

    fn service(
        store: Arc<dyn ProctorStore>,
        detector: MockFrameDetector,
        clock: Arc<ManualClock>,
    ) -> ProctoringService {
        ProctoringService::new(
            store,
            Arc::new(detector),
            DebounceService::new(DebouncePolicy::default()),
            clock,
        )
    }

    #[tokio::test]
    async fn malformed_image_never_reaches_detectors() {
        let store = Arc::new(MemoryStore::new());
        let attempt = store
            .create_attempt("student_a", "exam", Utc::now())
            .await
            .unwrap();
        let svc = service(store.clone(), MockFrameDetector::new(), clock());

        let err = svc.submit_frame(attempt.id, "not-an-image").await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(svc.debounce.tracked(), 0);
        assert_eq!(store.get_score_and_status(attempt.id).await.unwrap().score, 0);
    }

    #[tokio::test]
    async fn detector_failure_leaves_attempt_untouched() {
        let store = Arc::new(MemoryStore::new());
        let attempt = store
            .create_attempt("student_a", "exam", Utc::now())
            .await
            .unwrap();
        let mut detector = MockFrameDetector::new();
        detector
            .expect_face_geometry()
            .returning(|_| Err(Error::Detector("face mesh unavailable".into())));
        detector.expect_phone_present().returning(|_| Ok(false));
        let svc = service(store.clone(), detector, clock());

        let err = svc.submit_frame(attempt.id, &jpeg()).await.unwrap_err();
        assert!(matches!(err, Error::Detector(_)));
        assert_eq!(svc.debounce.tracked(), 0);
        assert!(store.list_events(attempt.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn multiple_faces_log_on_every_frame() {
        let store = Arc::new(MemoryStore::new());
        let attempt = store
            .create_attempt("student_a", "exam", Utc::now())
            .await
            .unwrap();
        let svc = service(store.clone(), detector(2, false, None), clock());

        let report = svc.submit_frame(attempt.id, &jpeg()).await.unwrap();
        assert_eq!(report.faces_detected, 2);
        assert_eq!(report.direction, Direction::Center);
        assert_eq!(report.gaze, Direction::Center);
        assert_eq!(report.evaluation, Evaluation::default());

        let report = svc.submit_frame(attempt.id, &jpeg()).await.unwrap();
        assert_eq!(report.evaluation.warning, Some(WarningTier::Warning));
        assert_eq!(store.get_score_and_status(attempt.id).await.unwrap().score, 6);
    }

    #[tokio::test]
    async fn score_termination_fires_once() {
        let store = Arc::new(MemoryStore::new());
        let attempt = store
            .create_attempt("student_a", "exam", Utc::now())
            .await
            .unwrap();
        let svc = service(store.clone(), detector(2, false, None), clock());

        let mut terminated = 0;
        for _ in 0..8 {
            let report = svc.submit_frame(attempt.id, &jpeg()).await.unwrap();
            if report.evaluation.status == Some(AttemptStatus::Terminated) {
                terminated += 1;
                assert_eq!(report.evaluation.warning, None);
            }
        }

        let standing = store.get_score_and_status(attempt.id).await.unwrap();
        assert_eq!(terminated, 1);
        assert_eq!(standing.status, AttemptStatus::Terminated);
        assert_eq!(standing.score, 15);
        assert_eq!(svc.debounce.tracked(), 0);
    }

    #[tokio::test]
    async fn identity_escalates_warning_then_termination() {
        let store = Arc::new(MemoryStore::new());
        let attempt = store
            .create_attempt("student_a", "exam", Utc::now())
            .await
            .unwrap();
        store.set_embedding(attempt.id, &[1.0, 0.0]).await.unwrap();
        let clock = clock();
        let svc = service(store.clone(), detector(1, false, Some(vec![0.0, 1.0])), clock.clone());

        for _ in 0..6 {
            clock.advance(Duration::seconds(1));
            svc.submit_frame(attempt.id, &jpeg()).await.unwrap();
        }

        let kinds: Vec<String> = store
            .list_events(attempt.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(kinds, vec!["IDENTITY_MISMATCH_WARNING", "FACE_MISMATCH"]);

        let standing = store.get_score_and_status(attempt.id).await.unwrap();
        assert_eq!(standing.status, AttemptStatus::Terminated);

        let report = svc.submit_frame(attempt.id, &jpeg()).await.unwrap();
        assert_eq!(report.evaluation, Evaluation::default());
        assert_eq!(
            store.get_score_and_status(attempt.id).await.unwrap().score,
            standing.score
        );
    }

    #[tokio::test]
    async fn embedding_is_skipped_without_enrollment() {
        let store = Arc::new(MemoryStore::new());
        let attempt = store
            .create_attempt("student_a", "exam", Utc::now())
            .await
            .unwrap();
        let mut detector = MockFrameDetector::new();
        detector
            .expect_face_geometry()
            .returning(|_| Ok(FaceGeometry {
                face_count: 1,
                head_direction: Direction::Left,
                gaze_direction: Direction::Center,
            }));
        detector.expect_phone_present().returning(|_| Ok(true));
        detector.expect_face_embedding().times(0);
        let svc = service(store, detector, clock());

        let report = svc.submit_frame(attempt.id, &jpeg()).await.unwrap();
        assert_eq!(report.direction, Direction::Left);
        assert_eq!(report.gaze, Direction::Center);
        assert!(report.phone_detected);
    }

    #[tokio::test]
    async fn failed_persistence_does_not_advance_tracker() {
        let attempt_id = Uuid::new_v4();
        let mut store = MockProctorStore::new();
        store.expect_get_embedding().returning(|_| Ok(None));
        store.expect_get_score_and_status().returning(|_| {
            Ok(AttemptStanding {
                score: 0,
                status: AttemptStatus::Ongoing,
            })
        });
        let mut calls = 0;
        store
            .expect_log_events()
            .times(2)
            .returning(move |_, event_types, _, _| {
                calls += 1;
                assert_eq!(event_types, ["NO_FACE".to_string()]);
                if calls == 1 {
                    Err(Error::Internal("connection reset".into()))
                } else {
                    Ok(LogOutcome::Logged {
                        events: Vec::new(),
                        standing: AttemptStanding {
                            score: 2,
                            status: AttemptStatus::Ongoing,
                        },
                    })
                }
            });

        let clock = clock();
        let svc = service(Arc::new(store), detector(0, false, None), clock.clone());

        svc.submit_frame(attempt_id, &jpeg()).await.unwrap();
        clock.advance(Duration::seconds(4));
        svc.submit_frame(attempt_id, &jpeg()).await.unwrap();
        clock.advance(Duration::seconds(4));
        assert!(svc.submit_frame(attempt_id, &jpeg()).await.is_err());

        // Had the failed frame been applied, the miss counter would have reset.
        clock.advance(Duration::seconds(1));
        let report = svc.submit_frame(attempt_id, &jpeg()).await.unwrap();
        assert_eq!(report.faces_detected, 0);
    }

    #[tokio::test]
    async fn browser_events_log_every_call() {
        let store = Arc::new(MemoryStore::new());
        let attempt = store
            .create_attempt("student_a", "exam", Utc::now())
            .await
            .unwrap();
        let svc = service(store.clone(), MockFrameDetector::new(), clock());

        for _ in 0..2 {
            svc.submit_event(attempt.id, "TAB_SWITCH").await.unwrap();
        }
        let evaluation = svc.submit_event(attempt.id, "CUSTOM_SIGNAL").await.unwrap();
        assert_eq!(evaluation.warning, Some(WarningTier::Warning));
        assert_eq!(store.get_score_and_status(attempt.id).await.unwrap().score, 5);

        store.end_attempt(attempt.id, Utc::now()).await.unwrap();
        assert_eq!(
            svc.submit_event(attempt.id, "TAB_SWITCH").await.unwrap(),
            Evaluation::default()
        );
        assert_eq!(store.list_events(attempt.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unknown_attempt_is_not_found() {
        let svc = service(Arc::new(MemoryStore::new()), MockFrameDetector::new(), clock());
        let err = svc.submit_event(Uuid::new_v4(), "TAB_SWITCH").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
