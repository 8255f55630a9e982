//! Per-asset cooldown timers
//!
//! An asset is cooling down while its expiry is strictly in the future.
//! Expiry is evaluated lazily; entries are never swept on a timer.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Default)]
pub struct CooldownTracker {
    expiries: HashMap<String, DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_cooldown(&self, asset: &str, now: DateTime<Utc>) -> bool {
        self.expiries
            .get(asset)
            .map(|expiry| *expiry > now)
            .unwrap_or(false)
    }

    /// Set expiry to `now + duration`, replacing any earlier entry.
    ///
    /// Saturates at the latest representable instant.
    pub fn start_cooldown(&mut self, asset: &str, now: DateTime<Utc>, duration: Duration) {
        let expiry = now
            .checked_add_signed(duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expiries.insert(asset.to_string(), expiry);
    }

    /// Time left before `asset` can trade again (zero when not cooling down)
    pub fn remaining(&self, asset: &str, now: DateTime<Utc>) -> Duration {
        match self.expiries.get(asset) {
            Some(expiry) if *expiry > now => *expiry - now,
            _ => Duration::zero(),
        }
    }

    /// Drop expired entries; returns how many were removed
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.expiries.len();
        self.expiries.retain(|_, expiry| *expiry > now);
        before - self.expiries.len()
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}
