use crate::models::exam_attempt::AttemptStatus;
use serde::{Deserialize, Serialize};

pub const WARNING_SCORE: i32 = 5;
pub const WARNING_YELLOW_SCORE: i32 = 8;
pub const FINAL_WARNING_SCORE: i32 = 12;
pub const TERMINATION_SCORE: i32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningTier {
    Warning,
    WarningYellow,
    FinalWarning,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub status: Option<AttemptStatus>,
    pub warning: Option<WarningTier>,
}

impl Evaluation {
    pub fn terminated() -> Self {
        Self {
            status: Some(AttemptStatus::Terminated),
            warning: None,
        }
    }
}

pub struct ScoringService;

impl ScoringService {
    /// Maps a cumulative score to a warning tier and, at the termination
    /// score, a transition that only fires for ONGOING attempts.
    pub fn evaluate(score: i32, current: AttemptStatus) -> Evaluation {
        let status = (score >= TERMINATION_SCORE && current == AttemptStatus::Ongoing)
            .then_some(AttemptStatus::Terminated);

        let warning = match score {
            s if s >= TERMINATION_SCORE => None,
            s if s >= FINAL_WARNING_SCORE => Some(WarningTier::FinalWarning),
            s if s >= WARNING_YELLOW_SCORE => Some(WarningTier::WarningYellow),
            s if s >= WARNING_SCORE => Some(WarningTier::Warning),
            _ => None,
        };

        Evaluation { status, warning }
    }

    /// Status an attempt ends with when the student submits.
    pub fn final_status(score: i32) -> AttemptStatus {
        if score >= TERMINATION_SCORE {
            AttemptStatus::Terminated
        } else {
            AttemptStatus::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_follow_cumulative_score() {
        let ongoing = AttemptStatus::Ongoing;
        assert_eq!(ScoringService::evaluate(0, ongoing), Evaluation::default());
        assert_eq!(ScoringService::evaluate(4, ongoing).warning, None);
        assert_eq!(
            ScoringService::evaluate(5, ongoing).warning,
            Some(WarningTier::Warning)
        );
        assert_eq!(
            ScoringService::evaluate(7, ongoing).warning,
            Some(WarningTier::Warning)
        );
        assert_eq!(
            ScoringService::evaluate(8, ongoing).warning,
            Some(WarningTier::WarningYellow)
        );
        assert_eq!(
            ScoringService::evaluate(11, ongoing).warning,
            Some(WarningTier::WarningYellow)
        );
        assert_eq!(
            ScoringService::evaluate(12, ongoing).warning,
            Some(WarningTier::FinalWarning)
        );
        assert_eq!(
            ScoringService::evaluate(14, ongoing).warning,
            Some(WarningTier::FinalWarning)
        );
    }

    #[test]
    fn termination_score_ends_an_ongoing_attempt_without_a_tier() {
        assert_eq!(
            ScoringService::evaluate(15, AttemptStatus::Ongoing),
            Evaluation::terminated()
        );
        assert_eq!(
            ScoringService::evaluate(40, AttemptStatus::Ongoing),
            Evaluation::terminated()
        );
    }

    #[test]
    fn termination_does_not_refire() {
        for status in [
            AttemptStatus::Terminated,
            AttemptStatus::Completed,
            AttemptStatus::Flagged,
        ] {
            assert_eq!(ScoringService::evaluate(20, status), Evaluation::default());
        }
    }

    #[test]
    fn final_status_on_submit() {
        assert_eq!(ScoringService::final_status(14), AttemptStatus::Completed);
        assert_eq!(ScoringService::final_status(15), AttemptStatus::Terminated);
    }
}
