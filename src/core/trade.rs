//! Trade records and their lifecycle states

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::adapters::types::Venue;
use crate::core::opportunity::Opportunity;

/// Two-leg trade state machine.
///
/// `Initiated -> PlacingBuy -> PlacingSell -> Completed`, or `Failed` from
/// any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStatus {
    Initiated,
    PlacingBuy,
    PlacingSell,
    Completed,
    Failed,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::Completed | TradeStatus::Failed)
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TradeStatus::Initiated => "Initiated",
            TradeStatus::PlacingBuy => "PlacingBuy",
            TradeStatus::PlacingSell => "PlacingSell",
            TradeStatus::Completed => "Completed",
            TradeStatus::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

/// Who asked for the trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeOrigin {
    Manual,
    Auto,
}

impl std::fmt::Display for TradeOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeOrigin::Manual => write!(f, "Manual"),
            TradeOrigin::Auto => write!(f, "Auto"),
        }
    }
}

/// One trade attempt. Every status change is appended to the ledger as a
/// full snapshot of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// `{ASSET}-{initiation epoch millis}`
    pub trade_id: String,
    pub initiated_at: DateTime<Utc>,
    /// Time of the latest status change
    pub timestamp: DateTime<Utc>,
    pub asset: String,
    pub buy_venue: Venue,
    pub buy_price: Decimal,
    pub sell_venue: Venue,
    pub sell_price: Decimal,
    pub quantity: Decimal,
    pub gross_profit: Decimal,
    pub fees: Decimal,
    pub net_profit: Decimal,
    pub status: TradeStatus,
    #[serde(default)]
    pub buy_order_id: String,
    #[serde(default)]
    pub sell_order_id: String,
    #[serde(default)]
    pub error: String,
    pub origin: TradeOrigin,
}

impl TradeRecord {
    /// Fresh `Initiated` record with price, venues and quantity fixed from `opportunity`.
    ///
    /// The id is provisional until [`SharedTradingState::reserve`] admits it.
    ///
    /// [`SharedTradingState::reserve`]: crate::core::state::SharedTradingState::reserve
    pub fn from_opportunity(opportunity: &Opportunity, origin: TradeOrigin, now: DateTime<Utc>) -> Self {
        Self {
            trade_id: trade_id_for(&opportunity.asset, now.timestamp_millis()),
            initiated_at: now,
            timestamp: now,
            asset: opportunity.asset.clone(),
            buy_venue: opportunity.buy_venue,
            buy_price: opportunity.buy_price,
            sell_venue: opportunity.sell_venue,
            sell_price: opportunity.sell_price,
            quantity: opportunity.quantity,
            gross_profit: opportunity.gross_profit,
            fees: opportunity.total_fees,
            net_profit: opportunity.net_profit,
            status: TradeStatus::Initiated,
            buy_order_id: String::new(),
            sell_order_id: String::new(),
            error: String::new(),
            origin,
        }
    }

    pub fn transition(&mut self, status: TradeStatus, now: DateTime<Utc>) {
        self.status = status;
        self.timestamp = now;
    }

    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.error = error.into();
        self.transition(TradeStatus::Failed, now);
    }
}

pub fn trade_id_for(asset: &str, millis: i64) -> String {
    format!("{}-{}", asset, millis)
}
