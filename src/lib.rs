//! Low-cap Cross-Exchange Arbitrage Engine
//!
//! Detects and executes two-leg price arbitrage between Binance and OKX for
//! assets priced under $5:
//! - Exchange adapters (price snapshots, balances, market orders)
//! - Fee-adjusted opportunity ranking
//! - Cooldown and concurrency gated trade execution
//! - Append-only trade ledger with statistics

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;

pub use error::AppError;
