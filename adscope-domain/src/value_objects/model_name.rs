// Model name value object

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelName {
    IsolationForest,
    #[serde(rename = "oneclass_svm")]
    OneClassSvm,
}

impl ModelName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelName::IsolationForest => "isolation_forest",
            ModelName::OneClassSvm => "oneclass_svm",
        }
    }

    pub fn score_column(&self) -> &'static str {
        match self {
            ModelName::IsolationForest => "iso_score",
            ModelName::OneClassSvm => "ocsvm_score",
        }
    }
}

impl std::fmt::Display for ModelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
