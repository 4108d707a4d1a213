use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    Center,
    Left,
    Right,
}

impl Direction {
    /// `None` for CENTER, which never opens an episode.
    pub fn off_center(self) -> Option<Direction> {
        match self {
            Direction::Center => None,
            other => Some(other),
        }
    }
}

/// Everything the detectors saw in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    pub face_count: u32,
    pub head_direction: Direction,
    pub gaze_direction: Direction,
    pub phone_present: bool,
    /// Cosine distance to the enrolled embedding; only measured for exactly one face.
    pub identity_distance: Option<f32>,
}

impl Observation {
    pub fn single_face(head_direction: Direction, gaze_direction: Direction) -> Self {
        Self {
            face_count: 1,
            head_direction,
            gaze_direction,
            ..Self::default()
        }
    }

    pub fn no_face() -> Self {
        Self::default()
    }

    pub fn with_phone(mut self, phone_present: bool) -> Self {
        self.phone_present = phone_present;
        self
    }

    pub fn with_identity_distance(mut self, distance: f32) -> Self {
        self.identity_distance = Some(distance);
        self
    }
}
