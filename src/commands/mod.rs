pub mod analyze;
pub mod common;
pub mod funding;
pub mod watch;
