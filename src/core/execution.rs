//! Two-leg trade orchestrator
//!
//! Admits a trade against the concurrency cap and cooldowns, logs it, then
//! drives buy and sell legs on a spawned task. Callers get a trade id back
//! immediately and observe progress through the ledger or the registry.
//!
//! # Architecture
//! - `TradeExecutor`: admission plus per-trade task spawning
//! - `InitiationError`: why a trade was refused
//!
//! Legs run sequentially, never retried, never unwound. A failed sell leg
//! leaves the bought quantity on the buy venue.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::adapters::{
    ExchangeAdapter, ExchangeError, ExchangeResult, OrderAck, OrderSide, Venue, VenuePair,
};
use crate::config::{constants, SharedConfig};
use crate::core::ledger::TradeLedger;
use crate::core::opportunity::Opportunity;
use crate::core::state::SharedTradingState;
use crate::core::trade::{TradeOrigin, TradeRecord, TradeStatus};
use crate::error::AppError;

// =============================================================================
// Errors
// =============================================================================

/// Reasons a trade is refused before any order is placed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitiationError {
    #[error("Max concurrent trades reached ({active}/{max})")]
    AtCapacity { active: usize, max: usize },

    #[error("Asset {asset} is in cooldown")]
    InCooldown { asset: String },

    #[error("No opportunity available for {0}")]
    AssetUnavailable(String),
}

// =============================================================================
// TradeExecutor
// =============================================================================

/// Cheap to clone; every clone shares the same registry, ledger and tracker.
#[derive(Clone)]
pub struct TradeExecutor {
    venues: VenuePair,
    config: SharedConfig,
    state: SharedTradingState,
    ledger: Arc<TradeLedger>,
    tracker: TaskTracker,
    order_timeout: Duration,
}

impl TradeExecutor {
    pub fn new(
        venues: VenuePair,
        config: SharedConfig,
        state: SharedTradingState,
        ledger: Arc<TradeLedger>,
    ) -> Self {
        Self {
            venues,
            config,
            state,
            ledger,
            tracker: TaskTracker::new(),
            order_timeout: Duration::from_millis(constants::order_timeout_ms()),
        }
    }

    /// Bound on each leg's order placement
    pub fn with_order_timeout(mut self, timeout: Duration) -> Self {
        self.order_timeout = timeout;
        self
    }

    pub fn state(&self) -> &SharedTradingState {
        &self.state
    }

    /// Admit `opportunity` and start executing it in the background.
    ///
    /// Price, venues and quantity are taken as given; nothing is re-checked
    /// against live prices.
    ///
    /// # Returns
    /// The trade id, once the `Initiated` row is written and the trade is
    /// registered
    pub async fn initiate(
        &self,
        opportunity: &Opportunity,
        origin: TradeOrigin,
    ) -> Result<String, InitiationError> {
        let (max_concurrent, cooldown) = {
            let config = self.config.read().await;
            (config.max_concurrent_trades, config.trade_cooldown())
        };

        let now = Utc::now();
        let mut record = TradeRecord::from_opportunity(opportunity, origin, now);
        self.state.reserve(&mut record, max_concurrent, cooldown, now).await?;

        self.append(&record).await;

        info!(
            trade_id = %record.trade_id,
            asset = %record.asset,
            origin = %origin,
            buy_venue = %record.buy_venue,
            buy_price = %record.buy_price,
            sell_venue = %record.sell_venue,
            sell_price = %record.sell_price,
            quantity = %record.quantity,
            net_profit = %record.net_profit,
            "[TRADE] Trade initiated"
        );

        let trade_id = record.trade_id.clone();
        let executor = self.clone();
        self.tracker.spawn(async move { executor.run(record).await });
        Ok(trade_id)
    }

    /// Wait for in-flight trades to reach a terminal state.
    ///
    /// Returns false if `timeout` elapsed first.
    pub async fn wait_for_trades(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let finished = tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok();
        self.tracker.reopen();
        finished
    }

    /// Trade task body. Always leaves a terminal ledger row and an empty
    /// registry slot, whatever happens inside the legs.
    async fn run(self, mut record: TradeRecord) {
        let outcome = AssertUnwindSafe(self.drive_legs(&mut record))
            .catch_unwind()
            .await;

        let unexpected = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(panic_message(panic.as_ref())),
        };

        if let Some(message) = unexpected {
            if !record.status.is_terminal() {
                error!(trade_id = %record.trade_id, error = %message, "[TRADE] Unexpected error during execution");
                record.fail(format!("Unexpected error: {}", message), Utc::now());
                self.append(&record).await;
            }
        }

        self.state.finish(&record.trade_id).await;
    }

    async fn drive_legs(&self, record: &mut TradeRecord) -> Result<(), AppError> {
        let buy_adapter = self.adapter_for(record.buy_venue)?;
        let sell_adapter = self.adapter_for(record.sell_venue)?;

        // Buy leg
        self.transition(record, TradeStatus::PlacingBuy).await;
        match place_leg(buy_adapter.as_ref(), &record.asset, OrderSide::Buy, record.quantity, self.order_timeout).await {
            Ok(ack) => record.buy_order_id = ack.order_id,
            Err(e) => {
                warn!(trade_id = %record.trade_id, venue = %record.buy_venue, error = %e, "[TRADE] Buy leg failed");
                record.fail(format!("Buy order failed: {}", e), Utc::now());
                self.append(record).await;
                return Ok(());
            }
        }

        // Sell leg
        self.transition(record, TradeStatus::PlacingSell).await;
        match place_leg(sell_adapter.as_ref(), &record.asset, OrderSide::Sell, record.quantity, self.order_timeout).await {
            Ok(ack) => record.sell_order_id = ack.order_id,
            Err(e) => {
                warn!(
                    trade_id = %record.trade_id,
                    buy_venue = %record.buy_venue,
                    buy_order_id = %record.buy_order_id,
                    quantity = %record.quantity,
                    error = %e,
                    "[TRADE] Sell leg failed after buy filled - position left open"
                );
                record.fail(format!("Sell order failed: {}", e), Utc::now());
                self.append(record).await;
                return Ok(());
            }
        }

        self.transition(record, TradeStatus::Completed).await;
        info!(
            trade_id = %record.trade_id,
            asset = %record.asset,
            buy_order_id = %record.buy_order_id,
            sell_order_id = %record.sell_order_id,
            net_profit = %record.net_profit,
            "[TRADE] Trade completed"
        );
        Ok(())
    }

    fn adapter_for(&self, venue: Venue) -> Result<Arc<dyn ExchangeAdapter>, AppError> {
        self.venues
            .adapter(venue)
            .cloned()
            .ok_or_else(|| AppError::Execution(format!("No adapter configured for {}", venue)))
    }

    /// Move to `status`, mirror into the registry and append a row
    async fn transition(&self, record: &mut TradeRecord, status: TradeStatus) {
        record.transition(status, Utc::now());
        self.state.update(record).await;
        self.append(record).await;
    }

    /// Ledger write failures are logged, never allowed to stop a trade
    async fn append(&self, record: &TradeRecord) {
        if let Err(e) = self.ledger.append(record).await {
            error!(
                trade_id = %record.trade_id,
                status = %record.status,
                error = %e,
                "[TRADE] Failed to append ledger row"
            );
        }
    }
}

/// One market order bounded by the order timeout
async fn place_leg(
    adapter: &dyn ExchangeAdapter,
    asset: &str,
    side: OrderSide,
    quantity: Decimal,
    timeout: Duration,
) -> ExchangeResult<OrderAck> {
    tokio::time::timeout(timeout, adapter.place_market_order(asset, side, quantity))
        .await
        .map_err(|_| ExchangeError::NetworkTimeout(timeout.as_millis() as u64))?
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
