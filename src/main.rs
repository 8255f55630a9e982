//! Low-cap arbitrage engine entry point
//!
//! 1. Loads configuration (defaults written on first run)
//! 2. Builds the Binance and OKX adapters
//! 3. Starts price refresh, balance refresh and auto-trade loops
//! 4. On Ctrl+C, stops the loops and waits for in-flight trades

use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use lowcap_arb::adapters::{BinanceAdapter, OkxAdapter, VenuePair};
use lowcap_arb::config::{self, constants};
use lowcap_arb::core::{init_logging, sanitize, ArbitrageEngine, TradeLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    init_logging();
    info!("Low-cap arbitrage engine starting...");

    let config_path = PathBuf::from(
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string()),
    );
    let mut app_config = config::load_or_default(&config_path);
    app_config.apply_env_overrides();

    info!(
        binance_url = %app_config.binance.base_url,
        binance_key = %sanitize(&app_config.binance.api_key),
        okx_url = %app_config.okx.base_url,
        okx_key = %sanitize(&app_config.okx.api_key),
        okx_demo = app_config.okx.demo_trading,
        "[CONFIG] Venues"
    );
    info!(
        min_profit_threshold = %app_config.min_profit_threshold,
        max_concurrent_trades = app_config.max_concurrent_trades,
        trade_cooldown_secs = app_config.trade_cooldown_secs,
        refresh_interval_secs = app_config.refresh_interval_secs,
        auto_trade = app_config.auto_trade,
        background_refresh = app_config.background_refresh,
        ledger = %app_config.ledger_path,
        "[CONFIG] Trading parameters"
    );
    constants::log_configuration();

    let venues = VenuePair::new(
        Arc::new(BinanceAdapter::new(app_config.binance.clone())),
        Arc::new(OkxAdapter::new(app_config.okx.clone())),
    );
    let ledger = TradeLedger::open(&app_config.ledger_path);
    let engine = ArbitrageEngine::new(venues, app_config.into_shared(), ledger)
        .with_config_path(&config_path);

    // Create shutdown broadcast channel
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("[SHUTDOWN] Graceful shutdown initiated");
                let _ = shutdown_signal.send(());
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for Ctrl+C signal");
            }
        }
    });

    let handles = engine.spawn_background_tasks(&shutdown_tx);
    info!("Engine running. Press Ctrl+C to stop.");

    let _ = shutdown_rx.recv().await;

    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "[SHUTDOWN] Background task ended abnormally");
        }
    }

    let active = engine.active_trades().await.len();
    if active > 0 {
        info!(active = active, "[SHUTDOWN] Waiting for in-flight trades");
    }
    if !engine.wait_for_trades(constants::shutdown_grace_period()).await {
        warn!("[SHUTDOWN] Grace period elapsed with trades still in flight");
    }

    match engine.trade_statistics().await {
        Ok(stats) => info!(
            total = stats.total_trades,
            completed = stats.completed_trades,
            failed = stats.failed_trades,
            net_profit = %stats.total_net_profit,
            "[SHUTDOWN] Session statistics"
        ),
        Err(e) => warn!(error = %e, "[SHUTDOWN] Could not read ledger statistics"),
    }

    info!("[SHUTDOWN] Clean exit");
    Ok(())
}
