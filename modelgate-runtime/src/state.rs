//! Shared application state for the serving runtime.

use std::sync::Arc;

use modelgate_config::InferenceConfiguration;

use crate::registry::{ProcessorRegistry, StepProcessor};

/// Shared state handed to every handler: the loaded configuration document,
/// the processor registry, and which processor this launch selected.
pub struct AppState {
    /// The configuration document the server is bound to.
    pub config: InferenceConfiguration,

    /// Registered step processors.
    pub registry: ProcessorRegistry,

    /// Identity of the processor selected at launch.
    pub processor_id: String,

    /// Service start time for uptime reporting.
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: InferenceConfiguration,
        registry: ProcessorRegistry,
        processor_id: impl Into<String>,
    ) -> Self {
        Self {
            config,
            registry,
            processor_id: processor_id.into(),
            started_at: chrono::Utc::now(),
        }
    }

    /// The selected step processor, if still registered.
    pub fn processor(&self) -> Option<Arc<dyn StepProcessor>> {
        self.registry.get(&self.processor_id)
    }

    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }
}
