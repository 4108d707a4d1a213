use crate::models::cheating_event::EventKind;
use crate::models::observation::{Direction, Observation};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Temporal thresholds for every debounced signal.
#[derive(Debug, Clone, PartialEq)]
pub struct DebouncePolicy {
    pub no_face_frames: u32,
    pub no_face_grace: Duration,
    pub phone_sustain: Duration,
    pub phone_cooldown: Duration,
    pub head_sustain: Duration,
    pub head_cooldown: Duration,
    pub gaze_sustain: Duration,
    pub gaze_cooldown: Duration,
    pub identity_threshold: f32,
    pub identity_frames: u32,
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self {
            no_face_frames: 3,
            no_face_grace: Duration::seconds(8),
            phone_sustain: Duration::seconds(3),
            phone_cooldown: Duration::seconds(8),
            head_sustain: Duration::seconds(2),
            head_cooldown: Duration::seconds(5),
            gaze_sustain: Duration::seconds(2),
            gaze_cooldown: Duration::seconds(5),
            identity_threshold: 0.35,
            identity_frames: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Episode<K> {
    kind: K,
    started_at: DateTime<Utc>,
}

/// Duration-gated, cooldown-limited channel for phone, head and gaze signals.
#[derive(Debug, Clone)]
struct SignalChannel<K> {
    episode: Option<Episode<K>>,
    last_logged: Option<DateTime<Utc>>,
}

impl<K> Default for SignalChannel<K> {
    fn default() -> Self {
        Self {
            episode: None,
            last_logged: None,
        }
    }
}

impl<K: Copy + PartialEq> SignalChannel<K> {
    fn observe(
        &mut self,
        current: Option<K>,
        now: DateTime<Utc>,
        sustain: Duration,
        cooldown: Duration,
    ) -> Option<K> {
        let Some(kind) = current else {
            self.episode = None;
            return None;
        };

        let started_at = match self.episode {
            Some(episode) if episode.kind == kind => episode.started_at,
            _ => {
                self.episode = Some(Episode {
                    kind,
                    started_at: now,
                });
                now
            }
        };

        if now - started_at < sustain {
            return None;
        }
        if self.last_logged.is_some_and(|last| now - last < cooldown) {
            return None;
        }

        self.last_logged = Some(now);
        Some(kind)
    }

    fn reset_episode(&mut self) {
        self.episode = None;
    }
}

#[derive(Debug, Clone, Default)]
struct NoFaceChannel {
    misses: u32,
    last_face_seen: Option<DateTime<Utc>>,
    absent_since: Option<DateTime<Utc>>,
}

impl NoFaceChannel {
    fn face_present(&mut self, now: DateTime<Utc>) {
        self.misses = 0;
        self.last_face_seen = Some(now);
        self.absent_since = None;
    }

    fn face_missing(&mut self, now: DateTime<Utc>, policy: &DebouncePolicy) -> bool {
        self.misses += 1;
        let since = *self
            .absent_since
            .get_or_insert(self.last_face_seen.unwrap_or(now));

        if self.misses < policy.no_face_frames || now - since < policy.no_face_grace {
            return false;
        }

        // A new absence window starts at the log.
        self.misses = 0;
        self.absent_since = Some(now);
        true
    }
}

/// Two-stage identity escalation: the first confirmed mismatch warns, the
/// next one terminates. There is no way back from `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    Normal { mismatches: u32 },
    Warned { mismatches: u32 },
    Terminated,
}

impl Default for IdentityState {
    fn default() -> Self {
        IdentityState::Normal { mismatches: 0 }
    }
}

impl IdentityState {
    /// Frames without a usable distance leave the streak as it is.
    pub fn observe(&mut self, distance: Option<f32>, policy: &DebouncePolicy) -> Option<EventKind> {
        let distance = distance.filter(|d| d.is_finite())?;
        let mismatched = distance > policy.identity_threshold;

        match *self {
            IdentityState::Terminated => None,
            IdentityState::Normal { mismatches } => {
                let mismatches = if mismatched { mismatches + 1 } else { 0 };
                if mismatches >= policy.identity_frames {
                    *self = IdentityState::Warned { mismatches: 0 };
                    Some(EventKind::IdentityMismatchWarning)
                } else {
                    *self = IdentityState::Normal { mismatches };
                    None
                }
            }
            IdentityState::Warned { mismatches } => {
                let mismatches = if mismatched { mismatches + 1 } else { 0 };
                if mismatches >= policy.identity_frames {
                    *self = IdentityState::Terminated;
                    Some(EventKind::FaceMismatch)
                } else {
                    *self = IdentityState::Warned { mismatches };
                    None
                }
            }
        }
    }
}

/// Events one frame produced, plus whether the attempt must end now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameVerdict {
    pub events: Vec<EventKind>,
    pub terminate: bool,
}

impl FrameVerdict {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && !self.terminate
    }
}

/// Transient per-attempt state. Lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct AttemptTracker {
    no_face: NoFaceChannel,
    phone: SignalChannel<()>,
    head: SignalChannel<Direction>,
    gaze: SignalChannel<Direction>,
    identity: IdentityState,
}

impl AttemptTracker {
    pub fn identity_state(&self) -> IdentityState {
        self.identity
    }

    pub fn observe(
        &mut self,
        observation: &Observation,
        now: DateTime<Utc>,
        policy: &DebouncePolicy,
    ) -> FrameVerdict {
        let mut verdict = FrameVerdict::default();
        if self.identity == IdentityState::Terminated {
            return verdict;
        }

        if self
            .phone
            .observe(
                observation.phone_present.then_some(()),
                now,
                policy.phone_sustain,
                policy.phone_cooldown,
            )
            .is_some()
        {
            verdict.events.push(EventKind::PhoneDetected);
        }

        if observation.face_count == 0 {
            self.head.reset_episode();
            self.gaze.reset_episode();
            if self.no_face.face_missing(now, policy) {
                verdict.events.push(EventKind::NoFace);
            }
            return verdict;
        }
        self.no_face.face_present(now);

        if observation.face_count > 1 {
            self.head.reset_episode();
            self.gaze.reset_episode();
            verdict.events.push(EventKind::MultipleFaces);
            return verdict;
        }

        match self.head.observe(
            observation.head_direction.off_center(),
            now,
            policy.head_sustain,
            policy.head_cooldown,
        ) {
            Some(Direction::Left) => verdict.events.push(EventKind::LookingLeft),
            Some(Direction::Right) => verdict.events.push(EventKind::LookingRight),
            _ => {}
        }

        match self.gaze.observe(
            observation.gaze_direction.off_center(),
            now,
            policy.gaze_sustain,
            policy.gaze_cooldown,
        ) {
            Some(Direction::Left) => verdict.events.push(EventKind::GazeLeft),
            Some(Direction::Right) => verdict.events.push(EventKind::GazeRight),
            _ => {}
        }

        if let Some(kind) = self.identity.observe(observation.identity_distance, policy) {
            verdict.terminate = kind == EventKind::FaceMismatch;
            verdict.events.push(kind);
        }

        verdict
    }
}

pub type TrackerHandle = Arc<tokio::sync::Mutex<AttemptTracker>>;

/// Registry of per-attempt trackers. The registry lock only guards the map;
/// each attempt is serialized by its own async mutex.
#[derive(Clone, Default)]
pub struct DebounceService {
    policy: Arc<DebouncePolicy>,
    trackers: Arc<Mutex<HashMap<Uuid, TrackerHandle>>>,
}

impl DebounceService {
    pub fn new(policy: DebouncePolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            trackers: Arc::default(),
        }
    }

    pub fn policy(&self) -> &DebouncePolicy {
        &self.policy
    }

    pub fn tracker(&self, attempt_id: Uuid) -> TrackerHandle {
        self.trackers.lock().entry(attempt_id).or_default().clone()
    }

    pub fn forget(&self, attempt_id: Uuid) {
        self.trackers.lock().remove(&attempt_id);
    }

    pub fn tracked(&self) -> usize {
        self.trackers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn centered() -> Observation {
        Observation::single_face(Direction::Center, Direction::Center)
    }

    #[test]
    fn phone_needs_three_seconds_then_respects_cooldown() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();
        let phone = centered().with_phone(true);

        let mut logged = Vec::new();
        for ms in (0..=20_000).step_by(500) {
            let verdict = tracker.observe(&phone, at_ms(ms), &policy);
            if verdict.events.contains(&EventKind::PhoneDetected) {
                logged.push(ms);
            }
        }

        assert_eq!(logged, vec![3_000, 11_000, 19_000]);
    }

    #[test]
    fn phone_episode_restarts_when_it_disappears() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();

        tracker.observe(&centered().with_phone(true), at(0), &policy);
        tracker.observe(&centered().with_phone(true), at(2), &policy);
        tracker.observe(&centered(), at(3), &policy);
        let verdict = tracker.observe(&centered().with_phone(true), at(4), &policy);
        assert!(verdict.events.is_empty());

        let verdict = tracker.observe(&centered().with_phone(true), at(7), &policy);
        assert_eq!(verdict.events, vec![EventKind::PhoneDetected]);
    }

    #[test]
    fn three_missing_frames_over_grace_log_one_no_face() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();

        let first = tracker.observe(&Observation::no_face(), at(0), &policy);
        let second = tracker.observe(&Observation::no_face(), at(4), &policy);
        let third = tracker.observe(&Observation::no_face(), at(8), &policy);

        assert!(first.events.is_empty());
        assert!(second.events.is_empty());
        assert_eq!(third.events, vec![EventKind::NoFace]);
    }

    #[test]
    fn two_missing_frames_log_nothing_even_after_grace() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();

        tracker.observe(&Observation::no_face(), at(0), &policy);
        let verdict = tracker.observe(&Observation::no_face(), at(30), &policy);
        assert!(verdict.events.is_empty());
    }

    #[test]
    fn a_visible_face_resets_the_absence_window() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();

        tracker.observe(&Observation::no_face(), at(0), &policy);
        tracker.observe(&Observation::no_face(), at(4), &policy);
        tracker.observe(&centered(), at(6), &policy);
        tracker.observe(&Observation::no_face(), at(8), &policy);
        tracker.observe(&Observation::no_face(), at(10), &policy);
        let verdict = tracker.observe(&Observation::no_face(), at(12), &policy);
        assert!(verdict.events.is_empty(), "only 6s since the face was seen");

        let verdict = tracker.observe(&Observation::no_face(), at(14), &policy);
        assert_eq!(verdict.events, vec![EventKind::NoFace]);
    }

    #[test]
    fn continued_absence_needs_a_fresh_window_before_relogging() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();
        let mut logged = Vec::new();

        for secs in (0..=24).step_by(2) {
            if !tracker
                .observe(&Observation::no_face(), at(secs), &policy)
                .events
                .is_empty()
            {
                logged.push(secs);
            }
        }

        assert_eq!(logged, vec![8, 16, 24]);
    }

    #[test]
    fn head_direction_change_restarts_the_episode() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();
        let left = Observation::single_face(Direction::Left, Direction::Center);
        let right = Observation::single_face(Direction::Right, Direction::Center);

        tracker.observe(&left, at(0), &policy);
        tracker.observe(&right, at(1), &policy);
        let verdict = tracker.observe(&right, at(2), &policy);
        assert!(verdict.events.is_empty());

        let verdict = tracker.observe(&right, at(3), &policy);
        assert_eq!(verdict.events, vec![EventKind::LookingRight]);
    }

    #[test]
    fn head_cooldown_is_shared_between_sides() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();
        let left = Observation::single_face(Direction::Left, Direction::Center);
        let right = Observation::single_face(Direction::Right, Direction::Center);

        tracker.observe(&left, at(0), &policy);
        assert_eq!(
            tracker.observe(&left, at(2), &policy).events,
            vec![EventKind::LookingLeft]
        );
        tracker.observe(&right, at(3), &policy);
        assert!(tracker.observe(&right, at(6), &policy).events.is_empty());
        assert_eq!(
            tracker.observe(&right, at(7), &policy).events,
            vec![EventKind::LookingRight]
        );
    }

    #[test]
    fn head_and_gaze_fire_independently_in_one_frame() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();
        let both = Observation::single_face(Direction::Left, Direction::Right);

        tracker.observe(&both, at(0), &policy);
        let verdict = tracker.observe(&both, at(2), &policy);
        assert_eq!(
            verdict.events,
            vec![EventKind::LookingLeft, EventKind::GazeRight]
        );
    }

    #[test]
    fn returning_to_center_resets_gaze() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();
        let gaze_left = Observation::single_face(Direction::Center, Direction::Left);

        tracker.observe(&gaze_left, at(0), &policy);
        tracker.observe(&centered(), at(1), &policy);
        assert!(tracker.observe(&gaze_left, at(2), &policy).events.is_empty());
        assert_eq!(
            tracker.observe(&gaze_left, at(4), &policy).events,
            vec![EventKind::GazeLeft]
        );
    }

    #[test]
    fn multiple_faces_log_on_the_first_frame() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();
        let crowd = Observation {
            face_count: 2,
            ..Observation::default()
        };

        assert_eq!(
            tracker.observe(&crowd, at(0), &policy).events,
            vec![EventKind::MultipleFaces]
        );
        assert_eq!(
            tracker.observe(&crowd, at_ms(100), &policy).events,
            vec![EventKind::MultipleFaces]
        );
    }

    #[test]
    fn missing_face_skips_head_and_identity_checks() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();
        let left = Observation::single_face(Direction::Left, Direction::Center);

        tracker.observe(&left, at(0), &policy);
        let gone = Observation {
            head_direction: Direction::Left,
            identity_distance: Some(0.9),
            ..Observation::no_face()
        };
        assert!(tracker.observe(&gone, at(3), &policy).events.is_empty());
        assert_eq!(tracker.identity_state(), IdentityState::Normal { mismatches: 0 });

        // The earlier head episode does not survive the gap.
        assert!(tracker.observe(&left, at(4), &policy).events.is_empty());
    }

    #[test]
    fn phone_is_checked_even_without_a_face() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();
        let phone_only = Observation::no_face().with_phone(true);

        tracker.observe(&phone_only, at(0), &policy);
        let verdict = tracker.observe(&phone_only, at(3), &policy);
        assert_eq!(verdict.events, vec![EventKind::PhoneDetected]);
    }

    #[test]
    fn identity_warns_once_then_terminates() {
        let policy = DebouncePolicy::default();
        let mut tracker = AttemptTracker::default();
        let stranger = centered().with_identity_distance(0.6);

        let verdicts: Vec<FrameVerdict> = (0..6)
            .map(|i| tracker.observe(&stranger, at(i), &policy))
            .collect();

        assert_eq!(verdicts[2].events, vec![EventKind::IdentityMismatchWarning]);
        assert!(!verdicts[2].terminate);
        assert!(verdicts[3].events.is_empty());
        assert!(verdicts[4].events.is_empty());
        assert_eq!(verdicts[5].events, vec![EventKind::FaceMismatch]);
        assert!(verdicts[5].terminate);

        assert!(tracker.observe(&stranger, at(7), &policy).is_empty());
        assert_eq!(tracker.identity_state(), IdentityState::Terminated);
    }

    #[test]
    fn identity_streak_requires_consecutive_frames() {
        let policy = DebouncePolicy::default();
        let mut state = IdentityState::default();

        assert_eq!(state.observe(Some(0.5), &policy), None);
        assert_eq!(state.observe(Some(0.5), &policy), None);
        assert_eq!(state.observe(Some(0.2), &policy), None);
        assert_eq!(state.observe(Some(0.5), &policy), None);
        assert_eq!(state.observe(None, &policy), None);
        assert_eq!(state.observe(Some(0.5), &policy), None);
        assert_eq!(state, IdentityState::Normal { mismatches: 2 });
        assert_eq!(
            state.observe(Some(0.36), &policy),
            Some(EventKind::IdentityMismatchWarning)
        );
    }

    #[test]
    fn non_finite_distance_keeps_the_streak() {
        let policy = DebouncePolicy::default();
        let mut state = IdentityState::default();

        assert_eq!(state.observe(Some(0.8), &policy), None);
        assert_eq!(state.observe(Some(0.8), &policy), None);
        assert_eq!(state.observe(Some(f32::NAN), &policy), None);
        assert_eq!(state.observe(Some(f32::INFINITY), &policy), None);
        assert_eq!(state, IdentityState::Normal { mismatches: 2 });
        assert_eq!(
            state.observe(Some(0.8), &policy),
            Some(EventKind::IdentityMismatchWarning)
        );
    }

    #[test]
    fn distance_at_threshold_is_a_match() {
        let policy = DebouncePolicy::default();
        let mut state = IdentityState::default();
        for _ in 0..5 {
            assert_eq!(state.observe(Some(0.35), &policy), None);
        }
        assert_eq!(state, IdentityState::Normal { mismatches: 0 });
    }

    #[tokio::test]
    async fn trackers_for_different_attempts_do_not_contend() {
        let service = DebounceService::new(DebouncePolicy::default());
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let held = service.tracker(first);
        let _guard = held.lock().await;

        let other = service.tracker(second);
        assert!(other.try_lock().is_ok());
        assert!(service.tracker(first).try_lock().is_err());
        assert_eq!(service.tracked(), 2);

        service.forget(second);
        assert_eq!(service.tracked(), 1);
    }
}
