//! Exchange adapter trait definition
//!
//! The ExchangeAdapter trait defines the common interface that both venue
//! adapters implement. The opportunity engine and trade executor only ever
//! talk to venues through this trait.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::errors::ExchangeResult;
use crate::adapters::types::{AssetBalance, OrderAck, OrderSide, PriceSnapshot, Venue};

/// Common trait for all exchange adapters
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
///
/// struct PaperAdapter;
///
/// #[async_trait]
/// impl ExchangeAdapter for PaperAdapter {
///     async fn fetch_prices(&self) -> ExchangeResult<PriceSnapshot> {
///         Ok(PriceSnapshot::empty(Venue::Binance))
///     }
///     // ... other methods
/// }
/// ```
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Fetch current spot prices, normalized to bare asset symbols.
    ///
    /// Only USDT-quoted pairs priced under $5 are kept. An error means the
    /// venue could not be read this cycle; callers must not read it as
    /// zero prices.
    async fn fetch_prices(&self) -> ExchangeResult<PriceSnapshot>;

    /// Fetch non-zero account balances (authenticated).
    ///
    /// Returns an empty list when no credentials are configured.
    async fn fetch_balances(&self) -> ExchangeResult<Vec<AssetBalance>>;

    /// Place a market order for `quantity` of `asset` against USDT.
    ///
    /// # Returns
    /// The exchange-assigned order identifier on acceptance
    async fn place_market_order(
        &self,
        asset: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> ExchangeResult<OrderAck>;

    /// Which venue this adapter talks to
    fn venue(&self) -> Venue;
}

/// The two venues the engine trades between.
///
/// `first` is the first-listed venue: it is passed as snapshot A to the
/// calculator and therefore wins the buy side on equal prices.
#[derive(Clone)]
pub struct VenuePair {
    first: Arc<dyn ExchangeAdapter>,
    second: Arc<dyn ExchangeAdapter>,
}

impl VenuePair {
    pub fn new(first: Arc<dyn ExchangeAdapter>, second: Arc<dyn ExchangeAdapter>) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> &Arc<dyn ExchangeAdapter> {
        &self.first
    }

    pub fn second(&self) -> &Arc<dyn ExchangeAdapter> {
        &self.second
    }

    /// Adapter for `venue`, if one of the pair serves it
    pub fn adapter(&self, venue: Venue) -> Option<&Arc<dyn ExchangeAdapter>> {
        [&self.first, &self.second]
            .into_iter()
            .find(|adapter| adapter.venue() == venue)
    }

    /// Poll both venues concurrently.
    ///
    /// A failed venue yields an empty snapshot (logged), which the
    /// calculator treats as "no opportunities", never as zero prices.
    pub async fn fetch_snapshots(&self) -> (PriceSnapshot, PriceSnapshot) {
        let (a, b) = tokio::join!(self.first.fetch_prices(), self.second.fetch_prices());
        (
            snapshot_or_empty(self.first.venue(), a),
            snapshot_or_empty(self.second.venue(), b),
        )
    }
}

fn snapshot_or_empty(venue: Venue, result: ExchangeResult<PriceSnapshot>) -> PriceSnapshot {
    match result {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(venue = %venue, error = %e, "Price fetch failed, using empty snapshot");
            PriceSnapshot::empty(venue)
        }
    }
}
