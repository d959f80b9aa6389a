//! Option chain response returned to the read API

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::greeks::Greeks;

/// One contract in an assembled chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainItem {
    pub contract_code: String,
    pub strike: Decimal,
    pub price: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: Option<u64>,
    pub open_interest: Option<u64>,
    /// Timestamp of the price record the fields came from
    pub price_ts: Option<DateTime<Utc>>,
    /// Filled by the Greeks job, never by the assembler
    pub greeks: Option<Greeks>,
    pub implied_vol: Option<f64>,
}

impl ChainItem {
    pub fn new(contract_code: impl Into<String>, strike: Decimal) -> Self {
        Self {
            contract_code: contract_code.into(),
            strike,
            price: None,
            bid: None,
            ask: None,
            volume: None,
            open_interest: None,
            price_ts: None,
            greeks: None,
            implied_vol: None,
        }
    }
}

/// Side-split, strike-sorted chain for one underlying/expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChainResponse {
    pub underlying: String,
    pub expiry: NaiveDate,
    pub spot: Option<f64>,
    pub calls: Vec<ChainItem>,
    pub puts: Vec<ChainItem>,
}

impl OptionChainResponse {
    /// Sort both sides ascending by strike
    pub fn sort_by_strike(&mut self) {
        self.calls.sort_by(|a, b| a.strike.cmp(&b.strike));
        self.puts.sort_by(|a, b| a.strike.cmp(&b.strike));
    }

    pub fn len(&self) -> usize {
        self.calls.len() + self.puts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }
}
