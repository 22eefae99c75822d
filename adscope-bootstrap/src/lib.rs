pub mod context;
pub mod lifecycle;

pub use context::AppContext;
pub use lifecycle::{
    execute_generate, execute_pipeline, init_tracing, report_config, run_generate, run_pipeline,
};
