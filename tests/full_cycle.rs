//! End-to-end tests for the arbitrage cycle
//!
//! Covers, against scripted venues:
//! 1. Opportunity ranking from two live snapshots
//! 2. Auto-trade through the background loops
//! 3. Manual trades, including unprofitable ones
//! 4. Leg failures recorded in the ledger
//! 5. Ledger persistence across reopen
//!
//! # Running the tests
//! ```bash
//! cargo test --test full_cycle
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::sleep;

use lowcap_arb::adapters::{
    AssetBalance, ExchangeAdapter, ExchangeError, ExchangeResult, OrderAck, OrderSide,
    PriceSnapshot, Venue, VenuePair,
};
use lowcap_arb::config::AppConfig;
use lowcap_arb::core::{
    ArbitrageEngine, InitiationError, LedgerQuery, TradeLedger, TradeOrigin, TradeRecord,
    TradeStatus,
};
use lowcap_arb::AppError;

// =============================================================================
// Scripted venue
// =============================================================================

/// Venue with fixed prices that records every order it accepts
struct ScriptedVenue {
    venue: Venue,
    prices: Mutex<Vec<(String, Decimal)>>,
    offline: AtomicBool,
    reject_sells: AtomicBool,
    buys: AtomicUsize,
    sells: AtomicUsize,
}

impl ScriptedVenue {
    fn new(venue: Venue, prices: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            venue,
            prices: Mutex::new(
                prices
                    .iter()
                    .map(|(a, p)| (a.to_string(), p.parse().unwrap()))
                    .collect(),
            ),
            offline: AtomicBool::new(false),
            reject_sells: AtomicBool::new(false),
            buys: AtomicUsize::new(0),
            sells: AtomicUsize::new(0),
        })
    }

    fn buys(&self) -> usize {
        self.buys.load(Ordering::SeqCst)
    }

    fn sells(&self) -> usize {
        self.sells.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeAdapter for ScriptedVenue {
    async fn fetch_prices(&self) -> ExchangeResult<PriceSnapshot> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ExchangeError::NetworkTimeout(10_000));
        }
        let prices = self.prices.lock().unwrap().clone();
        Ok(PriceSnapshot::from_prices(self.venue, prices))
    }

    async fn fetch_balances(&self) -> ExchangeResult<Vec<AssetBalance>> {
        Ok(vec![AssetBalance {
            asset: "USDT".into(),
            free: Decimal::from(250),
            locked: Decimal::ZERO,
        }])
    }

    async fn place_market_order(
        &self,
        asset: &str,
        side: OrderSide,
        _quantity: Decimal,
    ) -> ExchangeResult<OrderAck> {
        sleep(Duration::from_millis(5)).await;
        let n = match side {
            OrderSide::Buy => self.buys.fetch_add(1, Ordering::SeqCst),
            OrderSide::Sell => {
                if self.reject_sells.load(Ordering::SeqCst) {
                    return Err(ExchangeError::OrderRejected("insufficient balance".into()));
                }
                self.sells.fetch_add(1, Ordering::SeqCst)
            }
        };
        Ok(OrderAck {
            order_id: format!("{}-{}-{}", self.venue.id(), asset, n + 1),
            venue: self.venue,
            side,
        })
    }

    fn venue(&self) -> Venue {
        self.venue
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct Setup {
    engine: ArbitrageEngine,
    binance: Arc<ScriptedVenue>,
    okx: Arc<ScriptedVenue>,
    dir: TempDir,
}

fn setup(config: AppConfig) -> Setup {
    let binance = ScriptedVenue::new(
        Venue::Binance,
        &[("ABC", "1.00"), ("XYZ", "0.2500"), ("FLAT", "0.40"), ("BIG", "7.00")],
    );
    let okx = ScriptedVenue::new(
        Venue::Okx,
        &[("ABC", "1.10"), ("XYZ", "0.2490"), ("FLAT", "0.40"), ("ONLY", "0.10")],
    );
    let dir = TempDir::new().unwrap();
    let ledger = TradeLedger::open(dir.path().join("trade_log.jsonl"));
    let engine = ArbitrageEngine::new(
        VenuePair::new(binance.clone(), okx.clone()),
        config.into_shared(),
        ledger,
    );
    Setup { engine, binance, okx, dir }
}

/// Poll the ledger until `trade_id` reaches a terminal status
async fn wait_for_terminal(engine: &ArbitrageEngine, trade_id: &str) -> TradeRecord {
    for _ in 0..200 {
        let rows = engine.trade_history(&LedgerQuery::all()).await.unwrap();
        if let Some(latest) = rows.into_iter().find(|r| r.trade_id == trade_id) {
            if latest.status.is_terminal() {
                return latest;
            }
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("trade {} never reached a terminal status", trade_id);
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_opportunities_ranked_across_venues() {
    let s = setup(AppConfig::default());
    let opportunities = s.engine.opportunities().await;

    // BIG is above the price cap and ONLY is listed on one venue
    let assets: Vec<&str> = opportunities.iter().map(|o| o.asset.as_str()).collect();
    assert_eq!(assets.len(), 3);
    assert_eq!(assets[0], "ABC");
    assert!(!assets.contains(&"BIG"));
    assert!(!assets.contains(&"ONLY"));

    let abc = &opportunities[0];
    assert_eq!(abc.buy_venue, Venue::Binance);
    assert_eq!(abc.sell_venue, Venue::Okx);
    assert_eq!(abc.quantity, Decimal::from(4));
    assert_eq!(abc.net_profit, "0.3916".parse::<Decimal>().unwrap());
    assert!(abc.profitable);

    let xyz = opportunities.iter().find(|o| o.asset == "XYZ").unwrap();
    assert_eq!(xyz.buy_venue, Venue::Okx);
    assert!(!xyz.profitable);

    for pair in opportunities.windows(2) {
        assert!(pair[0].net_profit >= pair[1].net_profit);
    }
}

#[tokio::test]
async fn test_auto_trade_cycle_through_background_loops() {
    let mut config = AppConfig::default();
    config.auto_trade = true;
    let s = setup(config);

    let (shutdown_tx, _) = broadcast::channel(1);
    let handles = s.engine.spawn_background_tasks(&shutdown_tx);

    let mut trade_id = None;
    for _ in 0..200 {
        let rows = s.engine.trade_history(&LedgerQuery::all()).await.unwrap();
        if let Some(row) = rows.first() {
            trade_id = Some(row.trade_id.clone());
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    let trade_id = trade_id.expect("auto-trade never fired");
    let done = wait_for_terminal(&s.engine, &trade_id).await;

    shutdown_tx.send(()).unwrap();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    assert_eq!(done.status, TradeStatus::Completed);
    assert_eq!(done.origin, TradeOrigin::Auto);
    assert_eq!(done.asset, "ABC");
    assert_eq!(done.buy_order_id, "binance-ABC-1");
    assert_eq!(done.sell_order_id, "okx-ABC-1");
    assert_eq!(s.binance.buys(), 1);
    assert_eq!(s.okx.sells(), 1);
    assert_eq!(s.okx.buys(), 0);

    // Cooldown keeps the same asset from firing again
    assert!(s.engine.active_trades().await.is_empty());
    let completed = s
        .engine
        .trade_history(&LedgerQuery::all().with_status(TradeStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
}

#[tokio::test]
async fn test_manual_trade_ignores_profitability() {
    let s = setup(AppConfig::default());

    let trade_id = s.engine.execute_manual_trade("flat").await.unwrap();
    assert!(trade_id.starts_with("FLAT-"));
    let done = wait_for_terminal(&s.engine, &trade_id).await;

    assert_eq!(done.status, TradeStatus::Completed);
    assert_eq!(done.origin, TradeOrigin::Manual);
    // Equal prices: the first venue takes the buy side
    assert_eq!(done.buy_venue, Venue::Binance);
    assert!(done.net_profit < Decimal::ZERO);
}

#[tokio::test]
async fn test_manual_trade_rejects_unknown_asset() {
    let s = setup(AppConfig::default());
    let err = s.engine.execute_manual_trade("ONLY").await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Initiation(InitiationError::AssetUnavailable(_))
    ));
    assert_eq!(s.binance.buys() + s.okx.buys(), 0);
}

#[tokio::test]
async fn test_failed_sell_leg_is_recorded() {
    let s = setup(AppConfig::default());
    s.okx.reject_sells.store(true, Ordering::SeqCst);

    let trade_id = s.engine.execute_manual_trade("ABC").await.unwrap();
    let done = wait_for_terminal(&s.engine, &trade_id).await;

    assert_eq!(done.status, TradeStatus::Failed);
    assert!(!done.buy_order_id.is_empty());
    assert!(done.sell_order_id.is_empty());
    assert!(done.error.starts_with("Sell order failed"));

    let stats = s.engine.trade_statistics().await.unwrap();
    assert_eq!(stats.total_trades, 1);
    assert_eq!(stats.failed_trades, 1);
    assert_eq!(stats.completed_trades, 0);
}

#[tokio::test]
async fn test_ledger_survives_reopen() {
    let s = setup(AppConfig::default());
    let trade_id = s.engine.execute_manual_trade("ABC").await.unwrap();
    wait_for_terminal(&s.engine, &trade_id).await;
    assert!(s.engine.wait_for_trades(Duration::from_secs(2)).await);

    let reopened = TradeLedger::open(s.dir.path().join("trade_log.jsonl"));
    let rows = reopened.read_all(&LedgerQuery::all()).await.unwrap();
    let statuses: Vec<TradeStatus> = rows
        .iter()
        .filter(|r| r.trade_id == trade_id)
        .map(|r| r.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            TradeStatus::Completed,
            TradeStatus::PlacingSell,
            TradeStatus::PlacingBuy,
            TradeStatus::Initiated,
        ]
    );
}

#[tokio::test]
async fn test_offline_venue_yields_no_opportunities() {
    let s = setup(AppConfig::default());
    s.okx.offline.store(true, Ordering::SeqCst);

    assert!(s.engine.opportunities().await.is_empty());
    assert!(s.engine.execute_manual_trade("ABC").await.is_err());
    assert_eq!(s.binance.buys(), 0);
}
