//! Shared trading state: active-trade registry and cooldowns
//!
//! Both structures live behind one mutex so the capacity check, the
//! cooldown check and the registry insert happen in a single critical
//! section. Nothing outside this module touches the raw containers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::core::cooldown::CooldownTracker;
use crate::core::execution::InitiationError;
use crate::core::trade::{trade_id_for, TradeOrigin, TradeRecord};

#[derive(Debug, Default)]
struct TradingState {
    active: HashMap<String, TradeRecord>,
    cooldowns: CooldownTracker,
    /// Millis component of the last id issued per asset
    last_issued: HashMap<String, i64>,
}

impl TradingState {
    /// `{ASSET}-{millis}`, bumped past the previous id for the asset so two
    /// initiations in the same millisecond never share an id
    fn issue_trade_id(&mut self, asset: &str, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis();
        let issued = match self.last_issued.get(asset) {
            Some(&last) if last >= millis => last.saturating_add(1),
            _ => millis,
        };
        self.last_issued.insert(asset.to_string(), issued);
        trade_id_for(asset, issued)
    }
}

/// Cloneable handle to the registry and cooldown map
#[derive(Debug, Clone, Default)]
pub struct SharedTradingState {
    inner: Arc<Mutex<TradingState>>,
}

impl SharedTradingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new trade or explain why not.
    ///
    /// Every origin is held to `max_concurrent`. Only auto trades are held
    /// to the cooldown; manual trades skip the check but still restart the
    /// asset's timer. On admission `record.trade_id` is replaced with an id
    /// unique for this process.
    pub async fn reserve(
        &self,
        record: &mut TradeRecord,
        max_concurrent: usize,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), InitiationError> {
        let mut state = self.inner.lock().await;

        if state.active.len() >= max_concurrent {
            return Err(InitiationError::AtCapacity {
                active: state.active.len(),
                max: max_concurrent,
            });
        }
        if record.origin == TradeOrigin::Auto && state.cooldowns.is_in_cooldown(&record.asset, now) {
            return Err(InitiationError::InCooldown {
                asset: record.asset.clone(),
            });
        }
        record.trade_id = state.issue_trade_id(&record.asset, now);
        state.active.insert(record.trade_id.clone(), record.clone());
        state.cooldowns.start_cooldown(&record.asset, now, cooldown);
        Ok(())
    }

    /// Replace the registry copy of a live trade. Unknown ids are ignored.
    pub async fn update(&self, record: &TradeRecord) {
        let mut state = self.inner.lock().await;
        if let Some(entry) = state.active.get_mut(&record.trade_id) {
            *entry = record.clone();
        }
    }

    /// Remove a trade from the registry
    pub async fn finish(&self, trade_id: &str) -> Option<TradeRecord> {
        self.inner.lock().await.active.remove(trade_id)
    }

    pub async fn active_count(&self) -> usize {
        self.inner.lock().await.active.len()
    }

    /// Live trades, oldest first
    pub async fn active_trades(&self) -> Vec<TradeRecord> {
        let state = self.inner.lock().await;
        let mut trades: Vec<TradeRecord> = state.active.values().cloned().collect();
        trades.sort_by(|a, b| a.initiated_at.cmp(&b.initiated_at).then_with(|| a.trade_id.cmp(&b.trade_id)));
        trades
    }

    pub async fn is_in_cooldown(&self, asset: &str, now: DateTime<Utc>) -> bool {
        self.inner.lock().await.cooldowns.is_in_cooldown(asset, now)
    }

    /// Point-in-time copy of the cooldown map for the calculator.
    ///
    /// Expired entries are pruned on the way out.
    pub async fn cooldowns(&self, now: DateTime<Utc>) -> CooldownTracker {
        let mut state = self.inner.lock().await;
        state.cooldowns.prune_expired(now);
        state.cooldowns.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::types::Venue;
    use crate::core::opportunity::Opportunity;
    use crate::core::trade::TradeStatus;
    use rust_decimal::Decimal;

    fn record(asset: &str, origin: TradeOrigin, at: DateTime<Utc>) -> TradeRecord {
        let opportunity = Opportunity {
            asset: asset.into(),
            buy_venue: Venue::Binance,
            buy_price: Decimal::ONE,
            sell_venue: Venue::Okx,
            sell_price: Decimal::TWO,
            price_delta: Decimal::ONE,
            price_delta_pct: Decimal::ONE_HUNDRED,
            quantity: Decimal::from(4),
            gross_profit: Decimal::from(4),
            total_fees: Decimal::ZERO,
            net_profit: Decimal::from(4),
            profitable: true,
            in_cooldown: false,
        };
        TradeRecord::from_opportunity(&opportunity, origin, at)
    }

    #[tokio::test]
    async fn test_reserve_inserts_and_starts_cooldown() {
        let state = SharedTradingState::new();
        let now = Utc::now();
        let mut rec = record("ABC", TradeOrigin::Auto, now);

        state.reserve(&mut rec, 3, Duration::seconds(60), now).await.unwrap();

        assert_eq!(state.active_count().await, 1);
        assert!(state.is_in_cooldown("ABC", now).await);
    }

    #[tokio::test]
    async fn test_reserve_refuses_at_capacity_for_any_origin() {
        let state = SharedTradingState::new();
        let now = Utc::now();
        state.reserve(&mut record("AAA", TradeOrigin::Auto, now), 1, Duration::seconds(60), now).await.unwrap();

        let err = state
            .reserve(&mut record("BBB", TradeOrigin::Manual, now), 1, Duration::seconds(60), now)
            .await
            .unwrap_err();
        assert!(matches!(err, InitiationError::AtCapacity { active: 1, max: 1 }));
    }

    #[tokio::test]
    async fn test_auto_blocked_by_cooldown_manual_is_not() {
        let state = SharedTradingState::new();
        let t0 = Utc::now();
        let cooldown = Duration::seconds(60);

        let mut first = record("ABC", TradeOrigin::Auto, t0);
        state.reserve(&mut first, 5, cooldown, t0).await.unwrap();
        state.finish(&first.trade_id).await;

        let t1 = t0 + Duration::seconds(10);
        let err = state.reserve(&mut record("ABC", TradeOrigin::Auto, t1), 5, cooldown, t1).await.unwrap_err();
        assert!(matches!(err, InitiationError::InCooldown { .. }));

        state.reserve(&mut record("ABC", TradeOrigin::Manual, t1), 5, cooldown, t1).await.unwrap();

        // Manual initiation restarted the timer from t1
        let t2 = t0 + Duration::seconds(65);
        assert!(state.is_in_cooldown("ABC", t2).await);
    }

    #[tokio::test]
    async fn test_same_millisecond_ids_are_distinct() {
        let state = SharedTradingState::new();
        let now = Utc::now();

        let mut first = record("ABC", TradeOrigin::Manual, now);
        state.reserve(&mut first, 5, Duration::seconds(60), now).await.unwrap();
        state.finish(&first.trade_id).await;

        let mut second = record("ABC", TradeOrigin::Manual, now);
        state.reserve(&mut second, 5, Duration::seconds(60), now).await.unwrap();

        assert_eq!(first.trade_id, format!("ABC-{}", now.timestamp_millis()));
        assert_eq!(second.trade_id, format!("ABC-{}", now.timestamp_millis() + 1));

        // A clock that steps back still never reuses an id
        let mut third = record("ABC", TradeOrigin::Manual, now - Duration::seconds(1));
        state
            .reserve(&mut third, 5, Duration::seconds(60), now - Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(third.trade_id, format!("ABC-{}", now.timestamp_millis() + 2));

        // Other assets are numbered independently
        let mut other = record("XYZ", TradeOrigin::Manual, now);
        state.reserve(&mut other, 5, Duration::seconds(60), now).await.unwrap();
        assert_eq!(other.trade_id, format!("XYZ-{}", now.timestamp_millis()));
    }

    #[tokio::test]
    async fn test_update_and_finish() {
        let state = SharedTradingState::new();
        let now = Utc::now();
        let mut rec = record("ABC", TradeOrigin::Manual, now);
        state.reserve(&mut rec, 5, Duration::seconds(60), now).await.unwrap();

        rec.transition(TradeStatus::PlacingBuy, now);
        state.update(&rec).await;
        assert_eq!(state.active_trades().await[0].status, TradeStatus::PlacingBuy);

        let removed = state.finish(&rec.trade_id).await.unwrap();
        assert_eq!(removed.status, TradeStatus::PlacingBuy);
        assert_eq!(state.active_count().await, 0);

        // Updating a finished trade does not resurrect it
        state.update(&rec).await;
        assert_eq!(state.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_reserves_never_exceed_cap() {
        let state = SharedTradingState::new();
        let now = Utc::now();

        let mut handles = Vec::new();
        for i in 0..20 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                let mut rec = record(&format!("A{}", i), TradeOrigin::Auto, now);
                state.reserve(&mut rec, 3, Duration::seconds(60), now).await.is_ok()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
        assert_eq!(state.active_count().await, 3);
    }

    #[tokio::test]
    async fn test_cooldown_snapshot_prunes_expired() {
        let state = SharedTradingState::new();
        let t0 = Utc::now();
        let mut rec = record("OLD", TradeOrigin::Auto, t0);
        state.reserve(&mut rec, 5, Duration::seconds(1), t0).await.unwrap();

        let snapshot = state.cooldowns(t0 + Duration::seconds(5)).await;
        assert!(snapshot.is_empty());
    }
}
