use std::sync::Arc;

use adscope_domain::ports::{EventRepository, GoldRepository};
use adscope_domain::{GeneratorConfig, PipelineConfig};

use crate::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub generator: GeneratorConfig,
    pub pipeline: PipelineConfig,
    pub event_repo: Arc<dyn EventRepository>,
    pub gold_repo: Arc<dyn GoldRepository>,
    pub metrics: Arc<Metrics>,
}
