pub mod error;
pub mod rate_limiter;
pub mod retry;
pub mod traits;
pub mod types;
pub mod utils;

pub use error::AnalyticsError;
pub use rate_limiter::{RequestBudget, WindowLimit};
pub use traits::{ICandleSource, IFundingSource, IMarketLookup};
pub use types::*;
pub use utils::*;
