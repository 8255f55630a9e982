//! Opportunity calculator for cross-venue arbitrage
//!
//! Turns two normalized price snapshots into a ranked list of buy-low /
//! sell-high candidates with fee-adjusted profit. Pure: no I/O, no clock.
//!
//! # Architecture
//! - `FeeSchedule`: taker fee rate per venue
//! - `Opportunity`: one candidate trade, derived fresh on every pass
//! - `OpportunityCalculator`: the ranking pass itself

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapters::types::{PriceSnapshot, Venue};
use crate::config::AppConfig;
use crate::core::cooldown::CooldownTracker;

// =============================================================================
// Quantity Tiers
// =============================================================================

/// Units traded for a given buy price.
///
/// Keeps notional roughly comparable across tiers. Lower bounds inclusive,
/// upper bounds exclusive: 3.5 falls in the 1..=3.5 tier (4 units).
pub fn trade_quantity(buy_price: Decimal) -> Decimal {
    if buy_price > Decimal::new(35, 1) {
        Decimal::ONE
    } else if buy_price >= Decimal::ONE {
        Decimal::from(4)
    } else if buy_price >= Decimal::new(5, 1) {
        Decimal::from(8)
    } else {
        Decimal::from(15)
    }
}

// =============================================================================
// Fees
// =============================================================================

/// Taker fee rate (fraction of notional) charged by each venue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub binance: Decimal,
    pub okx: Decimal,
}

impl FeeSchedule {
    pub fn new(binance: Decimal, okx: Decimal) -> Self {
        Self { binance, okx }
    }

    /// Same rate on both venues
    pub fn flat(rate: Decimal) -> Self {
        Self::new(rate, rate)
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.taker_fee(Venue::Binance), config.taker_fee(Venue::Okx))
    }

    pub fn rate(&self, venue: Venue) -> Decimal {
        match venue {
            Venue::Binance => self.binance,
            Venue::Okx => self.okx,
        }
    }

    /// Fee for one leg executed on `venue`
    pub fn leg_fee(&self, venue: Venue, price: Decimal, quantity: Decimal) -> Decimal {
        self.rate(venue) * price * quantity
    }
}

// =============================================================================
// Opportunity
// =============================================================================

/// One candidate arbitrage trade.
///
/// `buy_price <= sell_price` always holds: the cheaper venue is the buy side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub asset: String,
    pub buy_venue: Venue,
    pub buy_price: Decimal,
    pub sell_venue: Venue,
    pub sell_price: Decimal,
    pub price_delta: Decimal,
    /// Delta as a percentage of the buy price
    pub price_delta_pct: Decimal,
    pub quantity: Decimal,
    pub gross_profit: Decimal,
    pub total_fees: Decimal,
    pub net_profit: Decimal,
    /// Net profit strictly above the configured threshold
    pub profitable: bool,
    pub in_cooldown: bool,
}

impl Opportunity {
    /// Eligible for the auto-trade monitor
    pub fn is_actionable(&self) -> bool {
        self.profitable && !self.in_cooldown
    }
}

// =============================================================================
// Calculator
// =============================================================================

pub struct OpportunityCalculator {
    fees: FeeSchedule,
    min_profit_threshold: Decimal,
}

impl OpportunityCalculator {
    pub fn new(fees: FeeSchedule, min_profit_threshold: Decimal) -> Self {
        Self {
            fees,
            min_profit_threshold,
        }
    }

    /// Calculator reflecting the current config (fees and threshold)
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(FeeSchedule::from_config(config), config.min_profit_threshold)
    }

    /// Rank every asset quoted on both venues by net profit, best first.
    ///
    /// On equal prices the venue of `snapshot_a` buys. Assets quoted on only
    /// one venue are skipped. Equal net profits keep ascending asset order.
    #[must_use]
    pub fn compute(
        &self,
        snapshot_a: &PriceSnapshot,
        snapshot_b: &PriceSnapshot,
        cooldowns: &CooldownTracker,
        now: DateTime<Utc>,
    ) -> Vec<Opportunity> {
        let mut opportunities: Vec<Opportunity> = snapshot_a
            .iter()
            .filter_map(|(asset, price_a)| {
                let price_b = snapshot_b.get(asset)?;
                Some(self.evaluate(
                    asset,
                    (snapshot_a.venue, price_a),
                    (snapshot_b.venue, price_b),
                    cooldowns.is_in_cooldown(asset, now),
                ))
            })
            .collect();

        opportunities.sort_by(|x, y| y.net_profit.cmp(&x.net_profit));
        opportunities
    }

    fn evaluate(
        &self,
        asset: &str,
        (venue_a, price_a): (Venue, Decimal),
        (venue_b, price_b): (Venue, Decimal),
        in_cooldown: bool,
    ) -> Opportunity {
        let ((buy_venue, buy_price), (sell_venue, sell_price)) = if price_a <= price_b {
            ((venue_a, price_a), (venue_b, price_b))
        } else {
            ((venue_b, price_b), (venue_a, price_a))
        };

        let quantity = trade_quantity(buy_price);
        let price_delta = sell_price - buy_price;
        // Zero when the ratio does not fit a Decimal (dust buy prices)
        let price_delta_pct = price_delta
            .checked_div(buy_price)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .map(|pct| pct.round_dp(4))
            .unwrap_or(Decimal::ZERO);

        let gross_profit = price_delta * quantity;
        let total_fees = self.fees.leg_fee(buy_venue, buy_price, quantity)
            + self.fees.leg_fee(sell_venue, sell_price, quantity);
        let net_profit = gross_profit - total_fees;

        Opportunity {
            asset: asset.to_string(),
            buy_venue,
            buy_price,
            sell_venue,
            sell_price,
            price_delta,
            price_delta_pct,
            quantity,
            gross_profit,
            total_fees,
            net_profit,
            profitable: net_profit > self.min_profit_threshold,
            in_cooldown,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
