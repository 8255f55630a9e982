//! Binance spot REST adapter
//!
//! Public ticker endpoint for prices, signed account/order endpoints for
//! balances and market orders. Symbols arrive as `DOGEUSDT` and are stripped
//! to `DOGE` before leaving this module.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::signing::binance_signature;
use crate::adapters::traits::ExchangeAdapter;
use crate::adapters::types::{
    create_http_client, parse_price, AssetBalance, OrderAck, OrderSide, PriceSnapshot, Venue,
    QUOTE_ASSET,
};
use crate::config::VenueConfig;

const API_KEY_HEADER: &str = "X-MBX-APIKEY";

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(rename = "orderId")]
    order_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

// =============================================================================
// Normalization
// =============================================================================

/// Build a snapshot from the raw ticker list.
///
/// Keeps `*USDT` pairs only, strips the quote suffix and drops unparsable
/// or out-of-range prices.
fn snapshot_from_tickers(tickers: Vec<TickerPrice>) -> PriceSnapshot {
    let mut snapshot = PriceSnapshot::empty(Venue::Binance);
    for ticker in tickers {
        let Some(asset) = ticker.symbol.strip_suffix(QUOTE_ASSET) else {
            continue;
        };
        if let Some(price) = parse_price(&ticker.price) {
            snapshot.insert_normalized(asset, price);
        }
    }
    snapshot
}

fn balances_from_account(account: AccountInfo) -> Vec<AssetBalance> {
    account
        .balances
        .into_iter()
        .map(|b| AssetBalance {
            asset: b.asset,
            free: parse_price(&b.free).unwrap_or(Decimal::ZERO),
            locked: parse_price(&b.locked).unwrap_or(Decimal::ZERO),
        })
        .filter(|b| !b.is_empty())
        .collect()
}

/// Map a non-2xx body to the most specific error available
fn error_from_body(status: reqwest::StatusCode, text: &str) -> ExchangeError {
    match serde_json::from_str::<ApiErrorBody>(text) {
        Ok(body) => ExchangeError::Api {
            code: body.code.to_string(),
            message: body.msg,
        },
        Err(_) => ExchangeError::InvalidResponse(format!("HTTP {}: {}", status, text)),
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// Binance spot adapter implementing ExchangeAdapter
pub struct BinanceAdapter {
    config: VenueConfig,
    http_client: reqwest::Client,
}

impl BinanceAdapter {
    pub fn new(config: VenueConfig) -> Self {
        Self {
            config,
            http_client: create_http_client("binance"),
        }
    }

    fn has_credentials(&self) -> bool {
        !self.config.api_key.is_empty() && !self.config.api_secret.is_empty()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Append `timestamp` and `signature` to a query string
    fn signed_query(&self, params: &str) -> ExchangeResult<String> {
        let timestamp = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={}", timestamp)
        } else {
            format!("{}&timestamp={}", params, timestamp)
        };
        let signature = binance_signature(&query, &self.config.api_secret)?;
        Ok(format!("{}&signature={}", query, signature))
    }

    async fn read_body(response: reqwest::Response) -> ExchangeResult<String> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::InvalidResponse(format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(error_from_body(status, &text));
        }
        Ok(text)
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    async fn fetch_prices(&self) -> ExchangeResult<PriceSnapshot> {
        let response = self
            .http_client
            .get(self.url("/v3/ticker/price"))
            .send()
            .await
            .map_err(|e| ExchangeError::ConnectionFailed(format!("Ticker request failed: {}", e)))?;

        let text = Self::read_body(response).await?;
        let tickers: Vec<TickerPrice> = serde_json::from_str(&text)
            .map_err(|e| ExchangeError::InvalidResponse(format!("Invalid JSON: {} - {}", e, text)))?;

        let snapshot = snapshot_from_tickers(tickers);
        tracing::debug!(venue = "binance", assets = snapshot.len(), "Prices fetched");
        Ok(snapshot)
    }

    async fn fetch_balances(&self) -> ExchangeResult<Vec<AssetBalance>> {
        if !self.has_credentials() {
            tracing::debug!(venue = "binance", "No credentials configured, skipping balances");
            return Ok(Vec::new());
        }

        let query = self.signed_query("")?;
        let response = self
            .http_client
            .get(format!("{}?{}", self.url("/v3/account"), query))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| ExchangeError::ConnectionFailed(format!("Account request failed: {}", e)))?;

        let text = Self::read_body(response).await?;
        let account: AccountInfo = serde_json::from_str(&text)
            .map_err(|e| ExchangeError::InvalidResponse(format!("Invalid JSON: {} - {}", e, text)))?;

        Ok(balances_from_account(account))
    }

    async fn place_market_order(
        &self,
        asset: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> ExchangeResult<OrderAck> {
        if !self.has_credentials() {
            return Err(ExchangeError::AuthenticationFailed(
                "Binance API key/secret not configured".into(),
            ));
        }

        let params = format!(
            "symbol={}{}&side={}&type=MARKET&quantity={}",
            asset, QUOTE_ASSET, side, quantity.normalize()
        );
        let query = self.signed_query(&params)?;

        tracing::info!(venue = "binance", asset = %asset, side = %side, quantity = %quantity, "Placing market order");

        let response = self
            .http_client
            .post(format!("{}?{}", self.url("/v3/order"), query))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| ExchangeError::ConnectionFailed(format!("Order request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::InvalidResponse(format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(ExchangeError::OrderRejected(format!("Order failed ({}): {}", status, text)));
        }

        let order: OrderResponse = serde_json::from_str(&text)
            .map_err(|e| ExchangeError::InvalidResponse(format!("Invalid JSON: {} - {}", e, text)))?;
        let order_id = order.order_id.ok_or_else(|| {
            ExchangeError::InvalidResponse(format!("Order response missing orderId: {}", text))
        })?;

        Ok(OrderAck {
            order_id: order_id.to_string(),
            venue: Venue::Binance,
            side,
        })
    }

    fn venue(&self) -> Venue {
        Venue::Binance
    }
}

// =============================================================================
// Tests
// =============================================================================
