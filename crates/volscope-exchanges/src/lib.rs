// Exchange adapters implementing the volscope-core data source traits.

pub mod bybit;
pub mod cache;
pub mod factory;

pub use volscope_core::{ICandleSource, IFundingSource, IMarketLookup};

pub use bybit::BybitClient;
pub use cache::ListingCache;
