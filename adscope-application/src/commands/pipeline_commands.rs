use ndarray::ArrayView2;
use tracing::{debug, info, warn};

use adscope_domain::services::{
    aggregate_campaign_days, aggregate_daily_revenue, evaluate_scores, feature_matrix,
    flag_daily_anomalies, ground_truth, IsolationForest, OneClassSvm, OutlierDetector,
};
use adscope_domain::{CampaignDayRow, MetricsReport, ModelName, ModelScores};

use crate::{AppError, AppState};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    pub events: usize,
    pub campaign_days: usize,
    pub predicted_outliers: usize,
    pub daily_rows: usize,
    pub ts_anomalies: usize,
    pub report: MetricsReport,
}

fn score(
    detector: &mut dyn OutlierDetector,
    x: ArrayView2<'_, f64>,
) -> Result<Vec<f64>, AppError> {
    let scores = detector.fit_anomaly_scores(x)?;
    let model = detector.name();
    debug!(
        model = %model,
        column = model.score_column(),
        rows = scores.len(),
        "scored campaign days"
    );
    Ok(scores)
}

fn evaluate(model: ModelName, labels: &[u8], scores: &[f64]) -> Result<ModelScores, AppError> {
    let result = evaluate_scores(labels, scores).map_err(|source| AppError::Evaluation {
        model: model.as_str(),
        source,
    })?;
    info!(model = %model, roc_auc = result.roc_auc, pr_auc = result.pr_auc, "evaluated");
    Ok(result)
}

/// Loads the raw events, scores campaign days with both detectors, evaluates
/// them against the injected labels and writes the gold tables and the report.
///
/// Metrics are computed before anything is written, so a label set without
/// both classes aborts the run with no outputs.
pub fn run_pipeline(state: &AppState) -> Result<PipelineSummary, AppError> {
    let metrics = &state.metrics;
    let events = state.event_repo.load_events()?;
    if events.is_empty() {
        return Err(AppError::EmptyInput);
    }
    metrics.record_loaded(events.len());
    info!(events = events.len(), "loaded raw events");

    let mut rows = aggregate_campaign_days(&events);
    let x = feature_matrix(&rows);
    info!(rows = rows.len(), "aggregated campaign days");

    let mut forest = IsolationForest::new(state.pipeline.isolation_forest.clone());
    let iso_scores = score(&mut forest, x.view())?;
    let predicted = forest.predict(x.view())?;
    let predicted_outliers = predicted.into_iter().filter(|flag| *flag).count();
    info!(
        predicted_outliers,
        contamination = state.pipeline.isolation_forest.contamination,
        "isolation forest fitted"
    );

    let mut svm = OneClassSvm::new(state.pipeline.one_class_svm.clone());
    let ocsvm_scores = score(&mut svm, x.view())?;
    if let Some(summary) = svm.summary() {
        if !summary.converged {
            warn!(
                iterations = summary.iterations,
                "one-class svm stopped before convergence"
            );
        }
        info!(
            support_vectors = summary.support_vectors,
            gamma = summary.gamma,
            iterations = summary.iterations,
            "one-class svm fitted"
        );
    }

    attach_scores(&mut rows, &iso_scores, &ocsvm_scores);
    let labels = ground_truth(&rows);
    let report = MetricsReport {
        isolation_forest: evaluate(ModelName::IsolationForest, &labels, &iso_scores)?,
        oneclass_svm: evaluate(ModelName::OneClassSvm, &labels, &ocsvm_scores)?,
    };
    metrics.record_campaign_days(rows.len(), predicted_outliers);

    state.gold_repo.save_campaign_days(&rows)?;
    metrics.record_file_written();

    let daily = aggregate_daily_revenue(&events);
    let daily_rows = flag_daily_anomalies(&daily, &state.pipeline.decomposition)?;
    let ts_anomalies = daily_rows.iter().filter(|r| r.ts_anomaly == 1).count();
    info!(
        days = daily_rows.len(),
        ts_anomalies,
        "decomposed daily revenue"
    );
    state.gold_repo.save_daily_revenue(&daily_rows)?;
    metrics.record_ts_anomalies(ts_anomalies);
    metrics.record_file_written();

    state.gold_repo.save_metrics(&report)?;
    metrics.record_file_written();

    Ok(PipelineSummary {
        events: events.len(),
        campaign_days: rows.len(),
        predicted_outliers,
        daily_rows: daily_rows.len(),
        ts_anomalies,
        report,
    })
}

fn attach_scores(rows: &mut [CampaignDayRow], iso: &[f64], ocsvm: &[f64]) {
    for ((row, iso), ocsvm) in rows.iter_mut().zip(iso).zip(ocsvm) {
        row.iso_score = *iso;
        row.ocsvm_score = *ocsvm;
    }
}
