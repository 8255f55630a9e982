//! Scriptable in-memory adapter shared by unit tests

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::traits::ExchangeAdapter;
use crate::adapters::types::{AssetBalance, OrderAck, OrderSide, PriceSnapshot, Venue};

/// Mock adapter with settable prices and per-side failure switches
pub struct MockAdapter {
    venue: Venue,
    prices: Mutex<Vec<(String, Decimal)>>,
    fail_prices: AtomicBool,
    fail_buy: AtomicBool,
    fail_sell: AtomicBool,
    panic_on_sell: AtomicBool,
    order_delay_ms: AtomicU64,
    pub buy_orders: AtomicU64,
    pub sell_orders: AtomicU64,
}

impl MockAdapter {
    pub fn new(venue: Venue) -> Self {
        Self {
            venue,
            prices: Mutex::new(Vec::new()),
            fail_prices: AtomicBool::new(false),
            fail_buy: AtomicBool::new(false),
            fail_sell: AtomicBool::new(false),
            panic_on_sell: AtomicBool::new(false),
            order_delay_ms: AtomicU64::new(0),
            buy_orders: AtomicU64::new(0),
            sell_orders: AtomicU64::new(0),
        }
    }

    pub fn with_prices(venue: Venue, prices: &[(&str, &str)]) -> Self {
        let adapter = Self::new(venue);
        adapter.set_prices(prices);
        adapter
    }

    pub fn set_prices(&self, prices: &[(&str, &str)]) {
        let parsed = prices
            .iter()
            .map(|(a, p)| (a.to_string(), p.parse::<Decimal>().unwrap()))
            .collect();
        *self.prices.lock().unwrap() = parsed;
    }

    pub fn fail_prices(&self, fail: bool) {
        self.fail_prices.store(fail, Ordering::SeqCst);
    }

    pub fn fail_buy(&self, fail: bool) {
        self.fail_buy.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sell(&self, fail: bool) {
        self.fail_sell.store(fail, Ordering::SeqCst);
    }

    pub fn panic_on_sell(&self, panic: bool) {
        self.panic_on_sell.store(panic, Ordering::SeqCst);
    }

    pub fn set_order_delay(&self, delay: Duration) {
        self.order_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn orders_placed(&self) -> u64 {
        self.buy_orders.load(Ordering::SeqCst) + self.sell_orders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeAdapter for MockAdapter {
    async fn fetch_prices(&self) -> ExchangeResult<PriceSnapshot> {
        if self.fail_prices.load(Ordering::SeqCst) {
            return Err(ExchangeError::ConnectionFailed("mock venue down".into()));
        }
        let prices = self.prices.lock().unwrap().clone();
        Ok(PriceSnapshot::from_prices(self.venue, prices))
    }

    async fn fetch_balances(&self) -> ExchangeResult<Vec<AssetBalance>> {
        Ok(vec![AssetBalance {
            asset: "USDT".into(),
            free: Decimal::from(100),
            locked: Decimal::ZERO,
        }])
    }

    async fn place_market_order(
        &self,
        asset: &str,
        side: OrderSide,
        _quantity: Decimal,
    ) -> ExchangeResult<OrderAck> {
        let delay = self.order_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let counter = match side {
            OrderSide::Buy => &self.buy_orders,
            OrderSide::Sell => &self.sell_orders,
        };
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;

        if side == OrderSide::Sell && self.panic_on_sell.load(Ordering::SeqCst) {
            panic!("mock adapter blew up");
        }
        let should_fail = match side {
            OrderSide::Buy => self.fail_buy.load(Ordering::SeqCst),
            OrderSide::Sell => self.fail_sell.load(Ordering::SeqCst),
        };
        if should_fail {
            return Err(ExchangeError::OrderRejected("insufficient balance".into()));
        }

        Ok(OrderAck {
            order_id: format!("{}-{}-{}-{}", self.venue.id(), asset, side, n),
            venue: self.venue,
            side,
        })
    }

    fn venue(&self) -> Venue {
        self.venue
    }
}
