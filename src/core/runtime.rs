//! Background loops: price refresh, balance refresh, auto-trade monitor
//!
//! Each loop is one long-lived task that re-reads the shared config every
//! iteration and stops on the shared broadcast shutdown signal. Network
//! failures are logged and retried after a short backoff; nothing here ever
//! ends the process.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::adapters::{AssetBalance, PriceSnapshot, Venue, VenuePair};
use crate::config::{constants, SharedConfig};
use crate::core::execution::{InitiationError, TradeExecutor};
use crate::core::opportunity::{Opportunity, OpportunityCalculator};
use crate::core::state::SharedTradingState;
use crate::core::trade::TradeOrigin;

// =============================================================================
// Market Cache
// =============================================================================

#[derive(Debug, Default)]
struct MarketData {
    opportunities: Vec<Opportunity>,
    prices_updated_at: Option<DateTime<Utc>>,
    balances: BTreeMap<Venue, Vec<AssetBalance>>,
}

/// Latest opportunities and balances written by the refresh loops
#[derive(Debug, Clone, Default)]
pub struct MarketCache {
    inner: Arc<RwLock<MarketData>>,
}

impl MarketCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store_opportunities(&self, opportunities: Vec<Opportunity>) {
        let mut data = self.inner.write().await;
        data.opportunities = opportunities;
        data.prices_updated_at = Some(Utc::now());
    }

    pub async fn store_balances(&self, venue: Venue, balances: Vec<AssetBalance>) {
        let mut data = self.inner.write().await;
        data.balances.insert(venue, balances);
    }

    pub async fn opportunities(&self) -> Vec<Opportunity> {
        self.inner.read().await.opportunities.clone()
    }

    pub async fn balances(&self) -> BTreeMap<Venue, Vec<AssetBalance>> {
        self.inner.read().await.balances.clone()
    }

    pub async fn prices_updated_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.prices_updated_at
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Fresh snapshots from both venues plus the ranked opportunities on them
pub async fn scan_market(
    venues: &VenuePair,
    config: &SharedConfig,
    state: &SharedTradingState,
) -> (PriceSnapshot, PriceSnapshot, Vec<Opportunity>) {
    let (a, b) = venues.fetch_snapshots().await;
    let calculator = OpportunityCalculator::from_config(&*config.read().await);
    let now = Utc::now();
    let cooldowns = state.cooldowns(now).await;
    let opportunities = calculator.compute(&a, &b, &cooldowns, now);
    (a, b, opportunities)
}

/// Sleep for `delay` unless shutdown arrives first. Returns true on shutdown.
async fn wait_or_shutdown(delay: Duration, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown_rx.recv() => true,
        _ = sleep(delay) => false,
    }
}

// =============================================================================
// Price refresh
// =============================================================================

/// Poll both venues every `refresh_interval_secs` and cache the result.
///
/// Idles while `background_refresh` is off.
pub async fn price_refresh_task(
    venues: VenuePair,
    config: SharedConfig,
    state: SharedTradingState,
    cache: MarketCache,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!("[REFRESH] Price refresh task started");

    loop {
        let (enabled, interval) = {
            let cfg = config.read().await;
            (cfg.background_refresh, cfg.refresh_interval())
        };

        let delay = if !enabled {
            constants::idle_poll_interval()
        } else {
            let (a, b, opportunities) = scan_market(&venues, &config, &state).await;
            let degraded = a.is_empty() || b.is_empty();
            let profitable = opportunities.iter().filter(|o| o.profitable).count();
            debug!(
                venue_a = %a.venue,
                assets_a = a.len(),
                venue_b = %b.venue,
                assets_b = b.len(),
                opportunities = opportunities.len(),
                profitable = profitable,
                "[REFRESH] Prices updated"
            );
            cache.store_opportunities(opportunities).await;

            if degraded {
                warn!("[REFRESH] A venue returned no prices, backing off");
                constants::error_backoff()
            } else {
                interval
            }
        };

        if wait_or_shutdown(delay, &mut shutdown_rx).await {
            break;
        }
    }

    info!("[REFRESH] Price refresh task stopped");
}

// =============================================================================
// Balance refresh
// =============================================================================

/// Poll account balances on both venues. The last good value stays cached
/// when a venue fails.
pub async fn balance_refresh_task(
    venues: VenuePair,
    config: SharedConfig,
    cache: MarketCache,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!("[REFRESH] Balance refresh task started");

    loop {
        let enabled = config.read().await.background_refresh;

        let delay = if !enabled {
            constants::idle_poll_interval()
        } else {
            let mut failed = false;
            for adapter in [venues.first(), venues.second()] {
                match adapter.fetch_balances().await {
                    Ok(balances) => cache.store_balances(adapter.venue(), balances).await,
                    Err(e) => {
                        failed = true;
                        warn!(venue = %adapter.venue(), error = %e, "[REFRESH] Balance fetch failed");
                    }
                }
            }
            if failed {
                constants::error_backoff()
            } else {
                constants::balance_refresh_interval()
            }
        };

        if wait_or_shutdown(delay, &mut shutdown_rx).await {
            break;
        }
    }

    info!("[REFRESH] Balance refresh task stopped");
}

// =============================================================================
// Auto-trade monitor
// =============================================================================

/// One auto-trade decision.
///
/// Returns the id of the trade started this tick, if any. Never starts
/// more than one.
pub async fn auto_trade_tick(
    executor: &TradeExecutor,
    venues: &VenuePair,
    config: &SharedConfig,
) -> Option<String> {
    let (enabled, max_concurrent) = {
        let cfg = config.read().await;
        (cfg.auto_trade, cfg.max_concurrent_trades)
    };
    if !enabled {
        return None;
    }

    let active = executor.state().active_count().await;
    if active >= max_concurrent {
        debug!(active = active, max = max_concurrent, "[AUTO] At capacity, skipping tick");
        return None;
    }

    let (_, _, opportunities) = scan_market(venues, config, executor.state()).await;
    let best = opportunities.into_iter().find(Opportunity::is_actionable)?;

    match executor.initiate(&best, TradeOrigin::Auto).await {
        Ok(trade_id) => {
            info!(
                trade_id = %trade_id,
                asset = %best.asset,
                net_profit = %best.net_profit,
                "[AUTO] Trade triggered"
            );
            Some(trade_id)
        }
        Err(e @ (InitiationError::AtCapacity { .. } | InitiationError::InCooldown { .. })) => {
            debug!(asset = %best.asset, reason = %e, "[AUTO] Initiation refused");
            None
        }
        Err(e) => {
            warn!(asset = %best.asset, error = %e, "[AUTO] Initiation failed");
            None
        }
    }
}

/// Run [`auto_trade_tick`] every auto-trade interval until shutdown
pub async fn auto_trade_task(
    executor: TradeExecutor,
    venues: VenuePair,
    config: SharedConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!("[AUTO] Auto-trade task started");
    let mut triggered: u64 = 0;

    loop {
        let enabled = config.read().await.auto_trade;
        let delay = if enabled {
            if auto_trade_tick(&executor, &venues, &config).await.is_some() {
                triggered += 1;
            }
            constants::auto_trade_interval()
        } else {
            constants::idle_poll_interval()
        };

        if wait_or_shutdown(delay, &mut shutdown_rx).await {
            break;
        }
    }

    info!(triggered = triggered, "[AUTO] Auto-trade task stopped");
}

// =============================================================================
// Tests
// =============================================================================
