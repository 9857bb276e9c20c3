use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::ml::ModelArtifact;
use crate::services::Metrics;

/// Shared application state for request handlers.
///
/// The model is loaded once before the server starts and is only ever read.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelArtifact>,
    pub metrics: Arc<Metrics>,
    pub service: Arc<ServiceConfig>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(model: ModelArtifact, service: ServiceConfig) -> Self {
        let class_names = model
            .class_labels()
            .iter()
            .map(|c| c.to_string())
            .collect();
        Self {
            model: Arc::new(model),
            metrics: Arc::new(Metrics::new(class_names)),
            service: Arc::new(service),
            started_at: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}
