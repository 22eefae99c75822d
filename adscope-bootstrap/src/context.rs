use std::sync::Arc;

use anyhow::Result;

use adscope_application::{AppState, Metrics};
use adscope_infrastructure::{
    compression_from_name, AppConfig, FileGoldRepository, ParquetEventRepository,
};

pub struct AppContext {
    pub config: AppConfig,
    pub state: AppState,
}

impl AppContext {
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        Self::from_config(AppConfig::load(config_path)?)
    }

    pub fn from_config(config: AppConfig) -> Result<Self> {
        let compression = compression_from_name(&config.compression);
        let paths = config.to_storage_paths();

        let state = AppState {
            generator: config.to_generator_config()?,
            pipeline: config.to_pipeline_config()?,
            event_repo: Arc::new(ParquetEventRepository::new(&paths.raw_events, compression)),
            gold_repo: Arc::new(FileGoldRepository::new(&paths, compression)),
            metrics: Arc::new(Metrics::default()),
        };

        Ok(Self { config, state })
    }
}
