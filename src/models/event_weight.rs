use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Weight applied to events whose type has no row in `event_weights`.
pub const DEFAULT_EVENT_WEIGHT: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventWeight {
    pub event_type: String,
    pub weight: i32,
}

/// Seed weights, mirrored by the initial migration.
pub fn default_weights() -> Vec<EventWeight> {
    [
        ("NO_FACE", 2),
        ("MULTIPLE_FACES", 3),
        ("LOOKING_LEFT", 1),
        ("LOOKING_RIGHT", 1),
        ("GAZE_LEFT", 1),
        ("GAZE_RIGHT", 1),
        ("PHONE_DETECTED", 4),
        ("FACE_MISMATCH", 5),
        ("IDENTITY_MISMATCH_WARNING", 2),
        ("TAB_SWITCH", 2),
        ("WINDOW_BLUR", 1),
        ("COPY_ATTEMPT", 2),
        ("PASTE_ATTEMPT", 2),
        ("DEVTOOLS_OPEN", 3),
        ("PAGE_EXIT", 2),
    ]
    .into_iter()
    .map(|(event_type, weight)| EventWeight {
        event_type: event_type.to_string(),
        weight,
    })
    .collect()
}
