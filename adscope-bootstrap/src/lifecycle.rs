use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use adscope_application::commands::{generate_events, run_pipeline as run_pipeline_command};
use adscope_application::commands::{GenerateSummary, PipelineSummary};

use adscope_infrastructure::AppConfig;

use crate::context::AppContext;

/// Console logging filtered by `RUST_LOG` (default `info`), plus a plain-text
/// copy in `log_file` when set. Keep the guard alive until exit.
pub fn init_tracing(log_file: Option<&str>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let path = Path::new(path);
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("log_file {} has no file name", path.display()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize tracing: {}", err))?;
    Ok(guard)
}

/// Logs where the config came from and every override that was skipped.
/// Call after `init_tracing`.
pub fn report_config(config: &AppConfig) {
    match &config.source {
        Some(path) => info!(config = %path.display(), "loaded config"),
        None => warn!("config file not found, using defaults"),
    }
    for ignored in &config.ignored_overrides {
        warn!(key = %ignored.key, value = %ignored.value, "ignoring unparsable override");
    }
}

pub fn execute_generate(context: &AppContext) -> Result<GenerateSummary> {
    let summary = generate_events(&context.state)?;
    info!(
        rows = summary.rows,
        injected = summary.injected,
        path = %context.config.raw_events_path,
        "generator finished"
    );
    Ok(summary)
}

pub fn execute_pipeline(context: &AppContext) -> Result<PipelineSummary> {
    let summary = run_pipeline_command(&context.state)?;
    info!(
        campaign_days = summary.campaign_days,
        ts_anomalies = summary.ts_anomalies,
        iforest_roc_auc = summary.report.isolation_forest.roc_auc,
        ocsvm_roc_auc = summary.report.oneclass_svm.roc_auc,
        "pipeline finished"
    );
    Ok(summary)
}

pub fn run_generate(config_path: Option<&str>) -> Result<()> {
    let context = AppContext::new(config_path)?;
    let _guard = init_tracing(context.config.log_file.as_deref())?;
    report_config(&context.config);
    execute_generate(&context)?;
    info!(metrics = %context.state.metrics.render_summary(), "run complete");
    Ok(())
}

pub fn run_pipeline(config_path: Option<&str>) -> Result<()> {
    let context = AppContext::new(config_path)?;
    let _guard = init_tracing(context.config.log_file.as_deref())?;
    report_config(&context.config);
    execute_pipeline(&context)?;
    info!(metrics = %context.state.metrics.render_summary(), "run complete");
    Ok(())
}
