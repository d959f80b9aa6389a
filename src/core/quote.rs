//! Market data records
//!
//! Chain snapshot rows, latest price records and minute bars.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::option::OptionRight;

/// One contract in an option chain snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshotRow {
    pub contract_code: String,
    pub right: OptionRight,
    pub strike: f64,
    pub expiry: NaiveDate,
    /// Last traded price
    pub last: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: u64,
    pub open_interest: u64,
    /// Contract multiplier
    pub multiplier: f64,
}

impl ChainSnapshotRow {
    /// Compute mid price from bid/ask
    pub fn mid(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(b), Some(a)) if b > 0.0 && a >= b => Some((b + a) / 2.0),
            _ => None,
        }
    }

    /// Best available price (last > mid), positive only
    pub fn best_price(&self) -> Option<f64> {
        self.last
            .filter(|p| p.is_finite() && *p > 0.0)
            .or_else(|| self.mid())
    }

    pub fn has_valid_price(&self) -> bool {
        self.best_price().is_some()
    }
}

/// Latest known price record for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    /// Last close
    pub close: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: Option<u64>,
    pub open_interest: Option<u64>,
}

impl PriceRecord {
    pub fn new(symbol: impl Into<String>, timestamp: DateTime<Utc>, close: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            close,
            bid: None,
            ask: None,
            volume: None,
            open_interest: None,
        }
    }

    /// Fold the most recent bar into a price record
    pub fn from_bar(symbol: impl Into<String>, bar: &MinuteBar) -> Self {
        let mut record = Self::new(symbol, bar.ts, bar.close);
        record.volume = Some(bar.volume);
        record
    }
}

/// One-minute OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteBar {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}
