//! Exchange adapters for Binance and OKX spot
//!
//! This module provides the common adapter trait plus one REST
//! implementation per venue.

pub mod binance;
pub mod errors;
pub mod okx;
pub mod signing;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types for convenience
pub use binance::BinanceAdapter;
pub use errors::{ExchangeError, ExchangeResult};
pub use okx::OkxAdapter;
pub use traits::{ExchangeAdapter, VenuePair};
pub use types::{AssetBalance, OrderAck, OrderSide, PriceSnapshot, Venue};
