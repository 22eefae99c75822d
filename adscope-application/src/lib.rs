// Application Layer

pub mod commands;
pub mod error;
pub mod metrics;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use error::AppError;
pub use metrics::Metrics;
pub use state::AppState;
