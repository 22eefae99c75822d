use ndarray::ArrayView2;
use thiserror::Error;

use crate::value_objects::ModelName;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("{0} is not fitted")]
    NotFitted(ModelName),
    #[error("{0} needs at least one sample")]
    EmptyInput(ModelName),
    #[error("feature count mismatch: fitted on {expected}, got {got}")]
    FeatureMismatch { expected: usize, got: usize },
    #[error("invalid {model} parameters: {reason}")]
    InvalidParams { model: ModelName, reason: String },
    #[error("worker pool: {0}")]
    WorkerPool(String),
}

/// Unsupervised outlier model fitted and scored on a feature matrix.
pub trait OutlierDetector: Send + Sync {
    fn name(&self) -> ModelName;

    fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<(), DetectorError>;

    /// Model output where larger means more normal.
    fn native_scores(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, DetectorError>;

    /// Negated native output: larger means more anomalous.
    fn anomaly_scores(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, DetectorError> {
        Ok(self.native_scores(x)?.into_iter().map(|s| -s).collect())
    }

    fn fit_anomaly_scores(&mut self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, DetectorError> {
        self.fit(x)?;
        self.anomaly_scores(x)
    }
}

pub(crate) fn check_features(
    expected: usize,
    x: &ArrayView2<'_, f64>,
) -> Result<(), DetectorError> {
    if x.ncols() != expected {
        return Err(DetectorError::FeatureMismatch {
            expected,
            got: x.ncols(),
        });
    }
    Ok(())
}
