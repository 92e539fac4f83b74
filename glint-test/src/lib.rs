mod fake;
mod helpers;
mod log_checker;

pub use fake::{Call, FakeGraphicsManager};
pub use helpers::*;
pub use log_checker::LogChecker;
