//! OKX v5 spot REST adapter
//!
//! Instruments arrive as `DOGE-USDT`. Every response is wrapped in a
//! `{ code, msg, data }` envelope; `code != "0"` is an API error even on
//! HTTP 200.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::signing::{okx_signature, okx_timestamp};
use crate::adapters::traits::ExchangeAdapter;
use crate::adapters::types::{
    create_http_client, parse_price, AssetBalance, OrderAck, OrderSide, PriceSnapshot, Venue,
    QUOTE_ASSET,
};
use crate::config::VenueConfig;

const TICKERS_PATH: &str = "/api/v5/market/tickers?instType=SPOT";
const BALANCE_PATH: &str = "/api/v5/account/balance";
const ORDER_PATH: &str = "/api/v5/trade/order";

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> ExchangeResult<Vec<T>> {
        if self.code != "0" {
            return Err(ExchangeError::Api {
                code: self.code,
                message: self.msg,
            });
        }
        Ok(self.data)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    inst_id: String,
    #[serde(default)]
    last: String,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    #[serde(default)]
    details: Vec<BalanceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceDetail {
    ccy: String,
    #[serde(default)]
    avail_bal: String,
    #[serde(default)]
    frozen_bal: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest<'a> {
    inst_id: String,
    td_mode: &'a str,
    side: &'a str,
    ord_type: &'a str,
    sz: String,
    /// Market buys are sized in base currency, matching the sell leg
    #[serde(skip_serializing_if = "Option::is_none")]
    tgt_ccy: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResult {
    #[serde(default)]
    ord_id: String,
    #[serde(default)]
    s_code: String,
    #[serde(default)]
    s_msg: String,
}

// =============================================================================
// Normalization
// =============================================================================

fn snapshot_from_tickers(tickers: Vec<Ticker>) -> PriceSnapshot {
    let suffix = format!("-{}", QUOTE_ASSET);
    let mut snapshot = PriceSnapshot::empty(Venue::Okx);
    for ticker in tickers {
        let Some(asset) = ticker.inst_id.strip_suffix(suffix.as_str()) else {
            continue;
        };
        match parse_price(&ticker.last) {
            Some(price) => {
                snapshot.insert_normalized(asset, price);
            }
            None => {
                tracing::debug!(venue = "okx", inst_id = %ticker.inst_id, "Skipping ticker with unparsable price");
            }
        }
    }
    snapshot
}

fn balances_from_account(accounts: Vec<AccountBalance>) -> Vec<AssetBalance> {
    accounts
        .into_iter()
        .flat_map(|a| a.details)
        .map(|d| AssetBalance {
            asset: d.ccy,
            free: parse_price(&d.avail_bal).unwrap_or(Decimal::ZERO),
            locked: parse_price(&d.frozen_bal).unwrap_or(Decimal::ZERO),
        })
        .filter(|b| !b.is_empty())
        .collect()
}

fn side_param(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// OKX spot adapter implementing ExchangeAdapter
pub struct OkxAdapter {
    config: VenueConfig,
    http_client: reqwest::Client,
}

impl OkxAdapter {
    pub fn new(config: VenueConfig) -> Self {
        Self {
            config,
            http_client: create_http_client("okx"),
        }
    }

    fn has_credentials(&self) -> bool {
        !self.config.api_key.is_empty()
            && !self.config.api_secret.is_empty()
            && !self.config.passphrase.is_empty()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http_client.request(method, self.url(path));
        if self.config.demo_trading {
            builder.header("x-simulated-trading", "1")
        } else {
            builder
        }
    }

    fn signed_request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &str,
    ) -> ExchangeResult<reqwest::RequestBuilder> {
        let timestamp = okx_timestamp(Utc::now());
        let signature = okx_signature(&timestamp, method.as_str(), path, body, &self.config.api_secret)?;
        Ok(self
            .request(method, path)
            .header("OK-ACCESS-KEY", &self.config.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", &self.config.passphrase)
            .header("Content-Type", "application/json"))
    }

    async fn read_envelope<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> ExchangeResult<Vec<T>> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::InvalidResponse(format!("Failed to read response: {}", e)))?;

        match serde_json::from_str::<Envelope<T>>(&text) {
            Ok(envelope) => envelope.into_data(),
            Err(_) if !status.is_success() => {
                Err(ExchangeError::InvalidResponse(format!("HTTP {}: {}", status, text)))
            }
            Err(e) => Err(ExchangeError::InvalidResponse(format!("Invalid JSON: {} - {}", e, text))),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for OkxAdapter {
    async fn fetch_prices(&self) -> ExchangeResult<PriceSnapshot> {
        let response = self
            .request(reqwest::Method::GET, TICKERS_PATH)
            .send()
            .await
            .map_err(|e| ExchangeError::ConnectionFailed(format!("Ticker request failed: {}", e)))?;

        let tickers: Vec<Ticker> = Self::read_envelope(response).await?;
        let snapshot = snapshot_from_tickers(tickers);
        tracing::debug!(venue = "okx", assets = snapshot.len(), "Prices fetched");
        Ok(snapshot)
    }

    async fn fetch_balances(&self) -> ExchangeResult<Vec<AssetBalance>> {
        if !self.has_credentials() {
            tracing::debug!(venue = "okx", "No credentials configured, skipping balances");
            return Ok(Vec::new());
        }

        let response = self
            .signed_request(reqwest::Method::GET, BALANCE_PATH, "")?
            .send()
            .await
            .map_err(|e| ExchangeError::ConnectionFailed(format!("Balance request failed: {}", e)))?;

        let accounts: Vec<AccountBalance> = Self::read_envelope(response).await?;
        Ok(balances_from_account(accounts))
    }

    async fn place_market_order(
        &self,
        asset: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> ExchangeResult<OrderAck> {
        if !self.has_credentials() {
            return Err(ExchangeError::AuthenticationFailed(
                "OKX API key/secret/passphrase not configured".into(),
            ));
        }

        let request = OrderRequest {
            inst_id: format!("{}-{}", asset, QUOTE_ASSET),
            td_mode: "cash",
            side: side_param(side),
            ord_type: "market",
            sz: quantity.normalize().to_string(),
            tgt_ccy: match side {
                OrderSide::Buy => Some("base_ccy"),
                OrderSide::Sell => None,
            },
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ExchangeError::InvalidResponse(format!("Failed to encode order: {}", e)))?;

        tracing::info!(venue = "okx", asset = %asset, side = %side, quantity = %quantity, "Placing market order");

        let response = self
            .signed_request(reqwest::Method::POST, ORDER_PATH, &body)?
            .body(body)
            .send()
            .await
            .map_err(|e| ExchangeError::ConnectionFailed(format!("Order request failed: {}", e)))?;

        let results: Vec<OrderResult> = Self::read_envelope(response).await.map_err(|e| match e {
            ExchangeError::Api { code, message } => {
                ExchangeError::OrderRejected(format!("OKX error {}: {}", code, message))
            }
            other => other,
        })?;

        let result = results
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::InvalidResponse("Order response has no data".into()))?;

        if !result.s_code.is_empty() && result.s_code != "0" {
            return Err(ExchangeError::OrderRejected(format!(
                "OKX error {}: {}",
                result.s_code, result.s_msg
            )));
        }
        if result.ord_id.is_empty() {
            return Err(ExchangeError::InvalidResponse("Order response missing ordId".into()));
        }

        Ok(OrderAck {
            order_id: result.ord_id,
            venue: Venue::Okx,
            side,
        })
    }

    fn venue(&self) -> Venue {
        Venue::Okx
    }
}

// =============================================================================
// Tests
// =============================================================================
