//! Core data types for exchange adapters
//!
//! These types are shared by both venue adapters so the opportunity engine
//! never sees venue-specific symbols or payloads.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// HTTP Client Constants
// =============================================================================

/// HTTP request timeout (seconds)
const HTTP_TIMEOUT_SECS: u64 = 10;
/// HTTP connection timeout (milliseconds)
const HTTP_CONNECT_TIMEOUT_MS: u64 = 3000;
/// Max idle connections per host in connection pool
const HTTP_POOL_MAX_IDLE: usize = 5;
/// How long idle connections stay in the pool (seconds)
const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 60;

/// Create the shared HTTP client for an exchange adapter
pub fn create_http_client(exchange_name: &str) -> reqwest::Client {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_millis(HTTP_CONNECT_TIMEOUT_MS))
        .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE)
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
    tracing::info!(
        phase = "init",
        exchange = %exchange_name,
        timeout_s = HTTP_TIMEOUT_SECS,
        connect_timeout_ms = HTTP_CONNECT_TIMEOUT_MS,
        "HTTP client configured"
    );
    client
}

// =============================================================================
// Normalization Rules
// =============================================================================

/// Quote asset every tracked pair is priced in
pub const QUOTE_ASSET: &str = "USDT";

/// Assets priced at or above this cutoff are dropped from snapshots
pub fn max_asset_price() -> Decimal {
    Decimal::from(5)
}

// =============================================================================
// Venue
// =============================================================================

/// The two venues the engine arbitrages between.
///
/// Declaration order matters: `Binance` is the first-listed venue and wins
/// the buy side when both venues quote the same price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Venue {
    Binance,
    #[serde(rename = "OKX")]
    Okx,
}

impl Venue {
    /// Lowercase identifier used in logs and config keys
    pub fn id(&self) -> &'static str {
        match self {
            Venue::Binance => "binance",
            Venue::Okx => "okx",
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Venue::Binance => write!(f, "Binance"),
            Venue::Okx => write!(f, "OKX"),
        }
    }
}

impl FromStr for Venue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binance" => Ok(Venue::Binance),
            "okx" => Ok(Venue::Okx),
            other => Err(format!("unknown venue: {}", other)),
        }
    }
}

// =============================================================================
// Price Snapshot
// =============================================================================

/// Normalized spot prices from one venue at one poll.
///
/// Keys are bare uppercase asset symbols ("DOGE", not "DOGEUSDT" or
/// "DOGE-USDT"). Ordered so every pass over a snapshot is deterministic.
#[derive(Debug, Clone, Serialize)]
pub struct PriceSnapshot {
    pub venue: Venue,
    prices: BTreeMap<String, Decimal>,
    pub fetched_at: DateTime<Utc>,
}

impl PriceSnapshot {
    /// Snapshot with no prices, used when a venue fetch fails
    pub fn empty(venue: Venue) -> Self {
        Self {
            venue,
            prices: BTreeMap::new(),
            fetched_at: Utc::now(),
        }
    }

    /// Build a snapshot from already-stripped `(asset, price)` pairs,
    /// applying the same filtering as [`PriceSnapshot::insert_normalized`].
    pub fn from_prices<I, S>(venue: Venue, prices: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let mut snapshot = Self::empty(venue);
        for (asset, price) in prices {
            snapshot.insert_normalized(asset.as_ref(), price);
        }
        snapshot
    }

    /// Insert a price if it passes the low-cap filter.
    ///
    /// Returns false when the price is non-positive or at/above the $5 cutoff.
    pub fn insert_normalized(&mut self, asset: &str, price: Decimal) -> bool {
        let asset = asset.trim();
        if asset.is_empty() || price <= Decimal::ZERO || price >= max_asset_price() {
            return false;
        }
        self.prices.insert(asset.to_ascii_uppercase(), price);
        true
    }

    pub fn get(&self, asset: &str) -> Option<Decimal> {
        self.prices.get(asset).copied()
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.prices.contains_key(asset)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Iterate `(asset, price)` in ascending asset order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.prices.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Parse a decimal price string as sent by exchanges ("0.12340000")
pub fn parse_price(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim()).ok()
}

// =============================================================================
// Orders & Balances
// =============================================================================

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Acknowledgement of an accepted market order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Exchange-assigned order identifier
    pub order_id: String,
    pub venue: Venue,
    pub side: OrderSide,
}

/// Non-zero balance of one asset on one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    /// Available for trading
    pub free: Decimal,
    /// Held by open orders (or frozen, on OKX)
    pub locked: Decimal,
}

impl AssetBalance {
    pub fn is_empty(&self) -> bool {
        self.free <= Decimal::ZERO && self.locked <= Decimal::ZERO
    }
}

// =============================================================================
// Tests
// =============================================================================
