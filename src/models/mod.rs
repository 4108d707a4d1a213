pub mod cheating_event;
pub mod event_weight;
pub mod exam_attempt;
pub mod observation;
