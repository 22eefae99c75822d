pub mod generate_commands;
pub mod pipeline_commands;

pub use generate_commands::*;
pub use pipeline_commands::*;
