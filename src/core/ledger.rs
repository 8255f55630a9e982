//! Append-only trade ledger
//!
//! Each status transition of a trade is written as one JSON line holding the
//! full [`TradeRecord`] at that moment. Lines are never rewritten. History
//! queries and statistics are derived by reading every line back.
//!
//! Storage sits behind [`LedgerStore`] so tests can run on memory.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::core::trade::{TradeRecord, TradeStatus};
use crate::error::AppError;

// =============================================================================
// Storage
// =============================================================================

/// Line-oriented storage backend
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist one line. Must be atomic with respect to other appends.
    async fn append_line(&self, line: &str) -> Result<(), AppError>;

    /// All lines in append order
    async fn read_lines(&self) -> Result<Vec<String>, AppError>;
}

/// JSON Lines file on disk
pub struct JsonlFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl LedgerStore for JsonlFileStore {
    async fn append_line(&self, line: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        // One write per record keeps lines whole
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_lines(&self) -> Result<Vec<String>, AppError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and dry runs
#[derive(Default)]
pub struct MemoryLedgerStore {
    lines: Mutex<Vec<String>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn append_line(&self, line: &str) -> Result<(), AppError> {
        self.lines.lock().await.push(line.to_string());
        Ok(())
    }

    async fn read_lines(&self) -> Result<Vec<String>, AppError> {
        Ok(self.lines.lock().await.clone())
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Filter for [`TradeLedger::read_all`]
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    pub status: Option<TradeStatus>,
    pub asset: Option<String>,
    pub limit: Option<usize>,
}

impl LedgerQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: TradeStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, record: &TradeRecord) -> bool {
        self.status.map_or(true, |s| record.status == s)
            && self
                .asset
                .as_deref()
                .map_or(true, |a| record.asset.eq_ignore_ascii_case(a))
    }
}

/// Aggregates over the whole ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeStatistics {
    /// Distinct trade ids ever initiated
    pub total_trades: usize,
    pub completed_trades: usize,
    pub failed_trades: usize,
    /// Sum of net profit over completed trades
    pub total_net_profit: Decimal,
    /// Zero when nothing has completed
    pub average_net_profit: Decimal,
}

// =============================================================================
// Ledger
// =============================================================================

pub struct TradeLedger {
    store: Box<dyn LedgerStore>,
}

impl TradeLedger {
    pub fn new(store: impl LedgerStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// JSON Lines ledger at `path`
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonlFileStore::new(path))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryLedgerStore::new())
    }

    /// Persist one snapshot of `record`
    pub async fn append(&self, record: &TradeRecord) -> Result<(), AppError> {
        let line = serde_json::to_string(record)?;
        self.store.append_line(&line).await
    }

    /// Every parsable row in append order. Malformed lines are skipped.
    async fn rows(&self) -> Result<Vec<TradeRecord>, AppError> {
        let lines = self.store.read_lines().await?;
        let mut rows = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            match serde_json::from_str::<TradeRecord>(line) {
                Ok(record) => rows.push(record),
                Err(e) => warn!(line = index + 1, error = %e, "Skipping malformed ledger line"),
            }
        }
        Ok(rows)
    }

    /// Filtered rows, newest first, then limited.
    ///
    /// Rows with equal timestamps keep reverse append order, so the later
    /// transition of a trade comes first.
    pub async fn read_all(&self, query: &LedgerQuery) -> Result<Vec<TradeRecord>, AppError> {
        let mut rows: Vec<TradeRecord> = self
            .rows()
            .await?
            .into_iter()
            .rev()
            .filter(|r| query.matches(r))
            .collect();

        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    pub async fn statistics(&self) -> Result<TradeStatistics, AppError> {
        let rows = self.rows().await?;

        let total_trades = rows
            .iter()
            .map(|r| r.trade_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        let completed: Vec<&TradeRecord> = rows
            .iter()
            .filter(|r| r.status == TradeStatus::Completed)
            .collect();
        let failed_trades = rows.iter().filter(|r| r.status == TradeStatus::Failed).count();

        let total_net_profit: Decimal = completed.iter().map(|r| r.net_profit).sum();
        let average_net_profit = if completed.is_empty() {
            Decimal::ZERO
        } else {
            total_net_profit / Decimal::from(completed.len())
        };

        Ok(TradeStatistics {
            total_trades,
            completed_trades: completed.len(),
            failed_trades,
            total_net_profit,
            average_net_profit,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
