use adscope_domain::{DecompositionError, DetectorError, EvaluationError, GeneratorError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("no events to score")]
    EmptyInput,
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error("daily decomposition: {0}")]
    Decomposition(#[from] DecompositionError),
    #[error("evaluation of {model}: {source}")]
    Evaluation {
        model: &'static str,
        #[source]
        source: EvaluationError,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<GeneratorError> for AppError {
    fn from(err: GeneratorError) -> Self {
        match err {
            GeneratorError::InvalidConfig(reason) => AppError::InvalidConfig(reason),
        }
    }
}
