pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::database::store::ProctorStore;
use crate::error::Result;
use crate::services::{
    attempt_service::AttemptService,
    debounce_service::{DebouncePolicy, DebounceService},
    detector_service::{FrameDetector, HttpDetector},
    proctoring_service::ProctoringService,
};
use crate::utils::time::{Clock, SystemClock};
use chrono::Duration;
use reqwest::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProctorStore>,
    pub debounce: DebounceService,
    pub proctoring_service: ProctoringService,
    pub attempt_service: AttemptService,
}

impl AppState {
    pub fn new(store: Arc<dyn ProctorStore>) -> Result<Self> {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let detector = HttpDetector::new(config.detector_url.clone(), http_client);

        Ok(Self::with_components(
            store,
            Arc::new(detector),
            Arc::new(SystemClock),
            config.debounce.clone(),
            Duration::seconds(config.abandon_after_secs),
        ))
    }

    /// Wires the services around explicit collaborators instead of the global config.
    pub fn with_components(
        store: Arc<dyn ProctorStore>,
        detector: Arc<dyn FrameDetector>,
        clock: Arc<dyn Clock>,
        policy: DebouncePolicy,
        abandon_after: Duration,
    ) -> Self {
        let debounce = DebounceService::new(policy);
        let proctoring_service = ProctoringService::new(
            store.clone(),
            detector.clone(),
            debounce.clone(),
            clock.clone(),
        );
        let attempt_service =
            AttemptService::new(store.clone(), detector, debounce.clone(), clock, abandon_after);

        Self {
            store,
            debounce,
            proctoring_service,
            attempt_service,
        }
    }
}
