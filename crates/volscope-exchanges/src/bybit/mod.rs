pub mod client;
pub mod conversions;
pub mod error;
pub mod types;

pub use client::BybitClient;
pub use error::BybitError;
