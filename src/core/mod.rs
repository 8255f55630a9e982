//! Core module - opportunity math, cooldowns, trade execution, ledger, loops
//!
//! This module uses **explicit re-exports** instead of glob exports
//! (`pub use module::*`) so the public API only grows on purpose.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use lowcap_arb::core::{ArbitrageEngine, LedgerQuery, TradeStatus};
//! ```

pub mod cooldown;
pub mod engine;
pub mod execution;
pub mod ledger;
pub mod logging;
pub mod opportunity;
pub mod runtime;
pub mod state;
pub mod trade;

// Explicit re-exports for opportunity module
pub use opportunity::{trade_quantity, FeeSchedule, Opportunity, OpportunityCalculator};

// Explicit re-exports for cooldown and state modules
pub use cooldown::CooldownTracker;
pub use state::SharedTradingState;

// Explicit re-exports for trade and ledger modules
pub use ledger::{
    JsonlFileStore, LedgerQuery, LedgerStore, MemoryLedgerStore, TradeLedger, TradeStatistics,
};
pub use trade::{TradeOrigin, TradeRecord, TradeStatus};

// Explicit re-exports for execution module
pub use execution::{InitiationError, TradeExecutor};

// Explicit re-exports for runtime module
pub use runtime::{
    auto_trade_task, auto_trade_tick, balance_refresh_task, price_refresh_task, scan_market,
    MarketCache,
};

// Explicit re-exports for engine module
pub use engine::ArbitrageEngine;

// Explicit re-exports for logging module
pub use logging::{
    init_logging, init_logging_with_config, sanitize, LoggingConfig, SanitizedValue,
    DEFAULT_LOG_LEVEL,
};
