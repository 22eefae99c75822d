// Run configuration models
// Built by the infrastructure config loader, consumed by services

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub rows: usize,
    pub days: u32,
    /// Last day of the window. `None` means the local date at generation time.
    pub end_date: Option<NaiveDate>,
    pub campaign_id_min: i64,
    /// Exclusive upper bound.
    pub campaign_id_max: i64,
    pub impressions_mean: f64,
    pub clicks_mean: f64,
    pub conversion_rate: f64,
    pub revenue_shape: f64,
    pub revenue_scale: f64,
    pub anomaly_rate: f64,
    pub click_multiplier: i64,
    pub revenue_multiplier: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            rows: 1_500_000,
            days: 90,
            end_date: None,
            campaign_id_min: 1,
            campaign_id_max: 2000,
            impressions_mean: 120.0,
            clicks_mean: 12.0,
            conversion_rate: 0.05,
            revenue_shape: 2.0,
            revenue_scale: 20.0,
            anomaly_rate: 0.01,
            click_multiplier: 10,
            revenue_multiplier: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestParams {
    pub n_estimators: usize,
    pub contamination: f64,
    pub seed: u64,
    /// `None` picks `min(256, n_samples)`.
    pub max_samples: Option<usize>,
    /// Worker threads for fitting and scoring. `None` uses every core.
    pub n_jobs: Option<usize>,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            contamination: 0.01,
            seed: 42,
            max_samples: None,
            n_jobs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelGamma {
    /// `1 / (n_features * var(X))`
    Scale,
    /// `1 / n_features`
    Auto,
    Value(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneClassSvmParams {
    pub nu: f64,
    pub gamma: KernelGamma,
    pub tol: f64,
    pub cache_mb: usize,
    pub max_iter: Option<usize>,
}

impl Default for OneClassSvmParams {
    fn default() -> Self {
        Self {
            nu: 0.01,
            gamma: KernelGamma::Scale,
            tol: 1e-3,
            cache_mb: 200,
            max_iter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionParams {
    pub period: usize,
    pub robust: bool,
    pub threshold_sigma: f64,
}

impl Default for DecompositionParams {
    fn default() -> Self {
        Self {
            period: 7,
            robust: true,
            threshold_sigma: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoragePaths {
    pub raw_events: String,
    pub campaign_output: String,
    pub daily_output: String,
    pub metrics_output: String,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self {
            raw_events: "data/raw/events.parquet".to_string(),
            campaign_output: "data/gold/campaign_daily_anomalies.parquet".to_string(),
            daily_output: "data/gold/daily_ts_anomalies.parquet".to_string(),
            metrics_output: "runs/metrics.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub isolation_forest: IsolationForestParams,
    pub one_class_svm: OneClassSvmParams,
    pub decomposition: DecompositionParams,
}
