//! Configuration types for engine settings
//!
//! This module defines all configuration structs that are loaded from YAML
//! and shared across the application via `Arc<RwLock<AppConfig>>`.
//! Every field has a default so a partial file still loads.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::adapters::types::Venue;
use crate::core::logging::sanitize;
use crate::error::AppError;

// ============================================================================
// Type Aliases
// ============================================================================

/// Type alias for shared configuration access across async tasks
pub type SharedConfig = Arc<RwLock<AppConfig>>;

/// Placeholder shown instead of configured secrets
const REDACTED: &str = "***";

/// Environment variables that may supply venue credentials
const CREDENTIAL_VARS: [&str; 5] = [
    "BINANCE_API_KEY",
    "BINANCE_API_SECRET",
    "OKX_API_KEY",
    "OKX_API_SECRET",
    "OKX_PASSPHRASE",
];

/// Credentials filled from the environment, keyed by variable name.
///
/// Kept out of the YAML so they are never written back to disk.
#[derive(Clone, Default, PartialEq)]
struct EnvCredentials(Vec<(&'static str, String)>);

impl std::fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter().map(|(var, _)| var)).finish()
    }
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Connection and fee settings for one venue
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct VenueConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Only used by OKX
    #[serde(default)]
    pub passphrase: String,
    /// Taker fee as a fraction (0.001 = 0.1%)
    pub taker_fee: Decimal,
    /// REST base URL
    pub base_url: String,
    /// Send the simulated-trading header (OKX demo environment)
    #[serde(default)]
    pub demo_trading: bool,
}

impl VenueConfig {
    pub fn binance_default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            passphrase: String::new(),
            taker_fee: Decimal::new(1, 3),
            base_url: "https://testnet.binance.vision/api".to_string(),
            demo_trading: false,
        }
    }

    pub fn okx_default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            passphrase: String::new(),
            taker_fee: Decimal::new(1, 3),
            base_url: "https://www.okx.com".to_string(),
            demo_trading: true,
        }
    }

    fn validate(&self, venue: Venue) -> Result<(), AppError> {
        if self.taker_fee < Decimal::ZERO || self.taker_fee >= Decimal::ONE {
            return Err(AppError::Config(format!(
                "{}: taker_fee must be >= 0 and < 1 (got {})",
                venue, self.taker_fee
            )));
        }
        if self.base_url.trim().is_empty() {
            return Err(AppError::Config(format!("{}: base_url cannot be empty", venue)));
        }
        Ok(())
    }

    /// Take credentials from `previous` wherever this config leaves them
    /// empty or masked
    fn keep_credentials_from(&mut self, previous: &VenueConfig) {
        fn keep(target: &mut String, previous: &str) {
            if target.is_empty() || target == REDACTED {
                *target = previous.to_string();
            }
        }
        keep(&mut self.api_key, &previous.api_key);
        keep(&mut self.api_secret, &previous.api_secret);
        keep(&mut self.passphrase, &previous.passphrase);
    }

    fn redacted(&self) -> Self {
        let mask = |s: &str| if s.is_empty() { String::new() } else { REDACTED.to_string() };
        Self {
            api_key: mask(&self.api_key),
            api_secret: mask(&self.api_secret),
            passphrase: mask(&self.passphrase),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for VenueConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueConfig")
            .field("api_key", &sanitize(&self.api_key).to_string())
            .field("api_secret", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .field("taker_fee", &self.taker_fee)
            .field("base_url", &self.base_url)
            .field("demo_trading", &self.demo_trading)
            .finish()
    }
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub binance: VenueConfig,
    pub okx: VenueConfig,
    /// Minimum net profit (USDT, absolute) for an opportunity to count as profitable
    pub min_profit_threshold: Decimal,
    /// Cap on simultaneously in-flight trades
    pub max_concurrent_trades: usize,
    /// Price refresh interval in seconds
    pub refresh_interval_secs: u64,
    /// Per-asset cooldown after a trade is initiated, in seconds
    pub trade_cooldown_secs: u64,
    /// Let the auto-trade monitor initiate trades
    pub auto_trade: bool,
    /// Run the price/balance refresh loops
    pub background_refresh: bool,
    /// Path of the append-only trade ledger
    pub ledger_path: String,
    #[serde(skip)]
    env_credentials: EnvCredentials,
}

/// Longest accepted per-asset cooldown (one week)
pub const MAX_TRADE_COOLDOWN_SECS: u64 = 7 * 24 * 60 * 60;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            binance: VenueConfig::binance_default(),
            okx: VenueConfig::okx_default(),
            min_profit_threshold: Decimal::new(9, 2),
            max_concurrent_trades: 3,
            refresh_interval_secs: 10,
            trade_cooldown_secs: 60,
            auto_trade: false,
            background_refresh: true,
            ledger_path: "trade_log.jsonl".to_string(),
            env_credentials: EnvCredentials::default(),
        }
    }
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        self.binance.validate(Venue::Binance)?;
        self.okx.validate(Venue::Okx)?;

        if self.min_profit_threshold < Decimal::ZERO {
            return Err(AppError::Config(format!(
                "min_profit_threshold must be >= 0 (got {})",
                self.min_profit_threshold
            )));
        }

        if self.max_concurrent_trades == 0 {
            return Err(AppError::Config(
                "max_concurrent_trades must be at least 1".to_string(),
            ));
        }

        if self.refresh_interval_secs == 0 {
            return Err(AppError::Config(
                "refresh_interval_secs must be at least 1".to_string(),
            ));
        }

        if self.trade_cooldown_secs > MAX_TRADE_COOLDOWN_SECS {
            return Err(AppError::Config(format!(
                "trade_cooldown_secs must be <= {} (got {})",
                MAX_TRADE_COOLDOWN_SECS, self.trade_cooldown_secs
            )));
        }

        if self.ledger_path.trim().is_empty() {
            return Err(AppError::Config("ledger_path cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Settings for one venue
    pub fn venue(&self, venue: Venue) -> &VenueConfig {
        match venue {
            Venue::Binance => &self.binance,
            Venue::Okx => &self.okx,
        }
    }

    /// Taker fee rate charged by `venue`
    pub fn taker_fee(&self, venue: Venue) -> Decimal {
        self.venue(venue).taker_fee
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Cooldown as a signed duration, clamped to [`MAX_TRADE_COOLDOWN_SECS`]
    pub fn trade_cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.trade_cooldown_secs.min(MAX_TRADE_COOLDOWN_SECS) as i64)
    }

    /// Fill credentials from the environment where the file leaves them empty
    ///
    /// Reads `BINANCE_API_KEY`, `BINANCE_API_SECRET`, `OKX_API_KEY`,
    /// `OKX_API_SECRET` and `OKX_PASSPHRASE`. Values taken here are left out
    /// of [`AppConfig::for_file`].
    pub fn apply_env_overrides(&mut self) {
        for var in CREDENTIAL_VARS {
            let Ok(value) = std::env::var(var) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            if let Some(target) = self.credential_mut(var) {
                if target.is_empty() {
                    *target = value.clone();
                    self.env_credentials.0.push((var, value));
                }
            }
        }
    }

    fn credential_mut(&mut self, var: &str) -> Option<&mut String> {
        match var {
            "BINANCE_API_KEY" => Some(&mut self.binance.api_key),
            "BINANCE_API_SECRET" => Some(&mut self.binance.api_secret),
            "OKX_API_KEY" => Some(&mut self.okx.api_key),
            "OKX_API_SECRET" => Some(&mut self.okx.api_secret),
            "OKX_PASSPHRASE" => Some(&mut self.okx.passphrase),
            _ => None,
        }
    }

    /// Copy to write to disk: credentials still holding their environment
    /// value are blanked
    pub fn for_file(&self) -> Self {
        let mut config = self.clone();
        for (var, value) in &self.env_credentials.0 {
            if let Some(target) = config.credential_mut(var) {
                if *target == *value {
                    target.clear();
                }
            }
        }
        config.env_credentials = EnvCredentials::default();
        config
    }

    /// Copy safe to hand to a presentation layer (secrets masked)
    pub fn redacted(&self) -> Self {
        Self {
            binance: self.binance.redacted(),
            okx: self.okx.redacted(),
            ..self.clone()
        }
    }

    /// Carry credentials over from `previous` for any that are empty or
    /// masked here (a config edited from its redacted form)
    pub fn keep_credentials_from(&mut self, previous: &AppConfig) {
        self.binance.keep_credentials_from(&previous.binance);
        self.okx.keep_credentials_from(&previous.okx);
        self.env_credentials = previous.env_credentials.clone();
    }

    /// Convert to shared state wrapper for async access
    pub fn into_shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }
}

// ============================================================================
// Tests
// ============================================================================
