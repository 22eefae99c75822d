pub mod gold_files;
pub mod parquet_events;

pub use gold_files::*;
pub use parquet_events::*;
