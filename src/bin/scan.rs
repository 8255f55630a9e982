//! One-shot market scan
//!
//! Fetches both venues once and prints the ranked opportunity table.
//! Never places orders.
//!
//! Usage:
//! ```bash
//! cargo run --bin scan
//! cargo run --bin scan -- 20   # show top 20 rows
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use lowcap_arb::adapters::{BinanceAdapter, OkxAdapter, VenuePair};
use lowcap_arb::config;
use lowcap_arb::core::{init_logging, scan_market, SharedTradingState};

const DEFAULT_ROWS: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let rows = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid row count '{}': {}", arg, e))?,
        None => DEFAULT_ROWS,
    };

    let config_path = PathBuf::from(
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string()),
    );
    let app_config = config::load_config(&config_path).unwrap_or_default();

    let venues = VenuePair::new(
        Arc::new(BinanceAdapter::new(app_config.binance.clone())),
        Arc::new(OkxAdapter::new(app_config.okx.clone())),
    );
    let threshold = app_config.min_profit_threshold;
    let shared = app_config.into_shared();

    // One fetch per venue; the table is computed from the same snapshots
    let (binance, okx, opportunities) =
        scan_market(&venues, &shared, &SharedTradingState::new()).await;
    info!(binance = binance.len(), okx = okx.len(), "Snapshots fetched");

    let profitable = opportunities.iter().filter(|o| o.profitable).count();

    println!(
        "{:<10} {:>8} {:>12} {:>8} {:>12} {:>9} {:>6} {:>12}",
        "ASSET", "BUY", "PRICE", "SELL", "PRICE", "DELTA%", "QTY", "NET"
    );
    for o in opportunities.iter().take(rows) {
        println!(
            "{:<10} {:>8} {:>12} {:>8} {:>12} {:>9} {:>6} {:>12}{}",
            o.asset,
            o.buy_venue.to_string(),
            o.buy_price.to_string(),
            o.sell_venue.to_string(),
            o.sell_price.to_string(),
            o.price_delta_pct.to_string(),
            o.quantity.to_string(),
            o.net_profit.round_dp(6).to_string(),
            if o.profitable { "  *" } else { "" },
        );
    }
    println!(
        "\n{} common assets, {} above the {} USDT threshold",
        opportunities.len(),
        profitable,
        threshold
    );

    Ok(())
}
