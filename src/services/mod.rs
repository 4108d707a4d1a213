pub mod attempt_service;
pub mod debounce_service;
pub mod detector_service;
pub mod proctoring_service;
pub mod scoring_service;
