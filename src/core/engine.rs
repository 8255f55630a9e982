//! Engine facade used by binaries and any presentation layer
//!
//! Wires adapters, config, trading state, ledger and executor together and
//! exposes the read and trade operations callers need.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::{AssetBalance, PriceSnapshot, Venue, VenuePair};
use crate::config::{save_config, AppConfig, SharedConfig};
use crate::core::execution::{InitiationError, TradeExecutor};
use crate::core::ledger::{LedgerQuery, TradeLedger, TradeStatistics};
use crate::core::opportunity::Opportunity;
use crate::core::runtime::{self, MarketCache};
use crate::core::state::SharedTradingState;
use crate::core::trade::{TradeOrigin, TradeRecord};
use crate::error::AppError;

pub struct ArbitrageEngine {
    venues: VenuePair,
    config: SharedConfig,
    config_path: Option<PathBuf>,
    ledger: Arc<TradeLedger>,
    executor: TradeExecutor,
    cache: MarketCache,
}

impl ArbitrageEngine {
    pub fn new(venues: VenuePair, config: SharedConfig, ledger: TradeLedger) -> Self {
        let ledger = Arc::new(ledger);
        let executor = TradeExecutor::new(
            venues.clone(),
            config.clone(),
            SharedTradingState::new(),
            ledger.clone(),
        );
        Self {
            venues,
            config,
            config_path: None,
            ledger,
            executor,
            cache: MarketCache::new(),
        }
    }

    /// Persist config changes to `path`
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Data cached by the background refresh loops
    pub fn cache(&self) -> &MarketCache {
        &self.cache
    }

    // =========================================================================
    // Market reads
    // =========================================================================

    /// Fresh price snapshots from both venues (empty for a venue that failed)
    pub async fn prices(&self) -> (PriceSnapshot, PriceSnapshot) {
        self.venues.fetch_snapshots().await
    }

    /// Fresh balances per venue. A failing venue reports no balances.
    pub async fn balances(&self) -> BTreeMap<Venue, Vec<AssetBalance>> {
        let mut result = BTreeMap::new();
        for adapter in [self.venues.first(), self.venues.second()] {
            let balances = match adapter.fetch_balances().await {
                Ok(balances) => balances,
                Err(e) => {
                    warn!(venue = %adapter.venue(), error = %e, "Balance fetch failed");
                    Vec::new()
                }
            };
            result.insert(adapter.venue(), balances);
        }
        result
    }

    /// Fresh ranked opportunities, also written to the cache
    pub async fn opportunities(&self) -> Vec<Opportunity> {
        let (_, _, opportunities) =
            runtime::scan_market(&self.venues, &self.config, self.executor.state()).await;
        self.cache.store_opportunities(opportunities.clone()).await;
        opportunities
    }

    // =========================================================================
    // Trading
    // =========================================================================

    /// Trade `asset` now at current prices.
    ///
    /// Ignores profitability and cooldown (the cooldown is still restarted)
    /// but respects the concurrency cap.
    pub async fn execute_manual_trade(&self, asset: &str) -> Result<String, AppError> {
        let asset = asset.trim().to_ascii_uppercase();
        let opportunity = self
            .opportunities()
            .await
            .into_iter()
            .find(|o| o.asset == asset)
            .ok_or_else(|| InitiationError::AssetUnavailable(asset.clone()))?;

        let trade_id = self.executor.initiate(&opportunity, TradeOrigin::Manual).await?;
        Ok(trade_id)
    }

    pub async fn active_trades(&self) -> Vec<TradeRecord> {
        self.executor.state().active_trades().await
    }

    pub async fn trade_history(&self, query: &LedgerQuery) -> Result<Vec<TradeRecord>, AppError> {
        self.ledger.read_all(query).await
    }

    pub async fn trade_statistics(&self) -> Result<TradeStatistics, AppError> {
        self.ledger.statistics().await
    }

    /// Wait for in-flight trades; false if `timeout` elapsed first
    pub async fn wait_for_trades(&self, timeout: Duration) -> bool {
        self.executor.wait_for_trades(timeout).await
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub async fn set_auto_trade(&self, enabled: bool) -> Result<(), AppError> {
        let snapshot = {
            let mut config = self.config.write().await;
            config.auto_trade = enabled;
            config.clone()
        };
        info!(enabled = enabled, "[CONFIG] Auto-trade toggled");
        self.persist(&snapshot)
    }

    /// Start or pause the price and balance refresh loops
    pub async fn set_background_refresh(&self, enabled: bool) -> Result<(), AppError> {
        let snapshot = {
            let mut config = self.config.write().await;
            config.background_refresh = enabled;
            config.clone()
        };
        info!(enabled = enabled, "[CONFIG] Background refresh toggled");
        self.persist(&snapshot)
    }

    /// Replace the running config. Takes effect on the next loop tick.
    ///
    /// Empty or masked credentials in `new_config` keep their current values.
    pub async fn update_config(&self, mut new_config: AppConfig) -> Result<(), AppError> {
        {
            let mut config = self.config.write().await;
            new_config.keep_credentials_from(&config);
            new_config.validate()?;
            *config = new_config.clone();
        }
        info!(
            min_profit_threshold = %new_config.min_profit_threshold,
            max_concurrent_trades = new_config.max_concurrent_trades,
            trade_cooldown_secs = new_config.trade_cooldown_secs,
            auto_trade = new_config.auto_trade,
            "[CONFIG] Configuration updated"
        );
        self.persist(&new_config)
    }

    /// Write `config` to the config path, without environment-sourced secrets
    fn persist(&self, config: &AppConfig) -> Result<(), AppError> {
        match &self.config_path {
            Some(path) => save_config(path, &config.for_file()),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    /// Start the price refresh, balance refresh and auto-trade loops
    pub fn spawn_background_tasks(&self, shutdown_tx: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(runtime::price_refresh_task(
                self.venues.clone(),
                self.config.clone(),
                self.executor.state().clone(),
                self.cache.clone(),
                shutdown_tx.subscribe(),
            )),
            tokio::spawn(runtime::balance_refresh_task(
                self.venues.clone(),
                self.config.clone(),
                self.cache.clone(),
                shutdown_tx.subscribe(),
            )),
            tokio::spawn(runtime::auto_trade_task(
                self.executor.clone(),
                self.venues.clone(),
                self.config.clone(),
                shutdown_tx.subscribe(),
            )),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::MockAdapter;
    use crate::config::load_config;
    use crate::core::trade::TradeStatus;
    use serial_test::serial;
    use tempfile::TempDir;

    fn engine() -> (ArbitrageEngine, Arc<MockAdapter>) {
        let binance = Arc::new(MockAdapter::with_prices(Venue::Binance, &[("ABC", "1.00"), ("FLAT", "0.3")]));
        let okx = Arc::new(MockAdapter::with_prices(Venue::Okx, &[("ABC", "1.10"), ("FLAT", "0.3")]));
        let engine = ArbitrageEngine::new(
            VenuePair::new(binance.clone(), okx),
            AppConfig::default().into_shared(),
            TradeLedger::in_memory(),
        );
        (engine, binance)
    }

    #[tokio::test]
    async fn test_opportunities_are_cached() {
        let (engine, _) = engine();
        let opportunities = engine.opportunities().await;
        assert_eq!(opportunities.len(), 2);
        assert_eq!(opportunities[0].asset, "ABC");
        assert_eq!(engine.cache().opportunities().await, opportunities);
    }

    #[tokio::test]
    async fn test_manual_trade_unknown_asset() {
        let (engine, binance) = engine();
        let err = engine.execute_manual_trade("NOPE").await.unwrap_err();
        assert!(matches!(err, AppError::Initiation(InitiationError::AssetUnavailable(_))));
        assert_eq!(binance.orders_placed(), 0);
    }

    #[tokio::test]
    async fn test_manual_trade_runs_to_completion() {
        let (engine, _) = engine();
        let trade_id = engine.execute_manual_trade(" abc ").await.unwrap();
        assert!(engine.wait_for_trades(Duration::from_secs(5)).await);

        let history = engine.trade_history(&LedgerQuery::all().with_limit(1)).await.unwrap();
        assert_eq!(history[0].trade_id, trade_id);
        assert_eq!(history[0].status, TradeStatus::Completed);
        assert_eq!(history[0].origin, TradeOrigin::Manual);
        assert!(engine.active_trades().await.is_empty());

        let stats = engine.trade_statistics().await.unwrap();
        assert_eq!(stats.completed_trades, 1);
        assert_eq!(stats.total_net_profit, history[0].net_profit);
    }

    #[tokio::test]
    async fn test_balances_per_venue() {
        let (engine, _) = engine();
        let balances = engine.balances().await;
        assert_eq!(balances.len(), 2);
        assert!(balances.contains_key(&Venue::Binance));
    }

    #[tokio::test]
    async fn test_prices_fetch_both_venues() {
        let (engine, _) = engine();
        let (binance, okx) = engine.prices().await;
        assert_eq!(binance.venue, Venue::Binance);
        assert_eq!(okx.get("ABC"), Some("1.10".parse().unwrap()));
        assert_eq!(binance.len(), 2);
    }

    #[tokio::test]
    async fn test_update_config_validates_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let (engine, _) = engine();
        let engine = engine.with_config_path(&path);

        let mut bad = AppConfig::default();
        bad.max_concurrent_trades = 0;
        assert!(engine.update_config(bad).await.is_err());
        assert_eq!(engine.config().read().await.max_concurrent_trades, 3);

        let mut good = AppConfig::default();
        good.trade_cooldown_secs = 15;
        engine.update_config(good).await.unwrap();
        engine.set_auto_trade(true).await.unwrap();

        let saved = load_config(&path).unwrap();
        assert_eq!(saved.trade_cooldown_secs, 15);
        assert!(saved.auto_trade);
    }

    #[tokio::test]
    #[serial(env)]
    async fn test_persist_leaves_env_credentials_out_of_file() {
        std::env::set_var("OKX_API_KEY", "okx-env-key-123456");
        std::env::set_var("OKX_API_SECRET", "okx-env-secret-123456");
        let mut config = AppConfig::default();
        config.binance.api_key = "binance-file-key".to_string();
        config.apply_env_overrides();
        std::env::remove_var("OKX_API_KEY");
        std::env::remove_var("OKX_API_SECRET");

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let binance = Arc::new(MockAdapter::new(Venue::Binance));
        let okx = Arc::new(MockAdapter::new(Venue::Okx));
        let engine = ArbitrageEngine::new(VenuePair::new(binance, okx), config.into_shared(), TradeLedger::in_memory())
            .with_config_path(&path);

        engine.set_auto_trade(true).await.unwrap();
        engine.update_config(AppConfig::default().redacted()).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("okx-env-key-123456"));
        assert!(!written.contains("okx-env-secret-123456"));
        assert!(written.contains("binance-file-key"));

        // The running engine still trades with them
        assert_eq!(engine.config().read().await.okx.api_key, "okx-env-key-123456");
    }

    #[tokio::test]
    async fn test_set_background_refresh_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let (engine, _) = engine();
        let engine = engine.with_config_path(&path);

        engine.set_background_refresh(false).await.unwrap();
        assert!(!engine.config().read().await.background_refresh);
        assert!(!load_config(&path).unwrap().background_refresh);
    }

    #[tokio::test]
    async fn test_background_tasks_stop_on_shutdown() {
        let (engine, _) = engine();
        let (shutdown_tx, _) = broadcast::channel(1);

        let handles = engine.spawn_background_tasks(&shutdown_tx);
        assert_eq!(handles.len(), 3);

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown_tx.send(()).unwrap();
        for handle in handles {
            assert!(tokio::time::timeout(Duration::from_secs(2), handle).await.is_ok());
        }
    }
}
