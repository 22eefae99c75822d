// Domain value objects
pub mod model_name;

pub use model_name::*;
