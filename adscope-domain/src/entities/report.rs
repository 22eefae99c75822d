// Evaluation report written to runs/metrics.json

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelScores {
    pub roc_auc: f64,
    pub pr_auc: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsReport {
    pub isolation_forest: ModelScores,
    pub oneclass_svm: ModelScores,
}
