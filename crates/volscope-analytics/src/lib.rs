pub mod metrics;
pub mod scanner;
pub mod service;
pub mod stats;
pub mod types;

pub use metrics::{IMetricsEngine, MetricsEngine};
pub use scanner::{FundingScanner, DEFAULT_TOP_LIMIT};
pub use service::MetricsService;
pub use types::*;
