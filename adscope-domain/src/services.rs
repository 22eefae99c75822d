pub mod aggregation;
pub mod decomposition;
pub mod detectors;
pub mod evaluation;
pub mod generator;
pub mod isolation_forest;
pub mod one_class_svm;

pub use aggregation::*;
pub use decomposition::*;
pub use detectors::*;
pub use evaluation::*;
pub use generator::*;
pub use isolation_forest::*;
pub use one_class_svm::*;
