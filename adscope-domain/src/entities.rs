// Domain entities
pub mod campaign_day;
pub mod daily;
pub mod event;
pub mod model;
pub mod report;

pub use campaign_day::*;
pub use daily::*;
pub use event::*;
pub use model::*;
pub use report::*;
