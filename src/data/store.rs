//! Persistence boundaries
//!
//! The relational layer is an external collaborator; the pipeline only sees
//! these repository traits. In-memory implementations back tests and
//! embedded use.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;

use crate::core::{
    ContractState, MinuteBar, OptionContract, OptionDailyFactor, OptionGreeks, OptionsError,
    OptionsResult, PriceRecord,
};

/// Latest-price lookups over the minute-bar store
pub trait PriceStore: Send + Sync {
    /// Latest record for every symbol, in a single round trip
    ///
    /// Symbols without a record are simply missing from the map.
    fn latest_prices(&self, symbols: &[String]) -> OptionsResult<HashMap<String, PriceRecord>>;

    fn latest_price(&self, symbol: &str) -> OptionsResult<Option<PriceRecord>> {
        let mut prices = self.latest_prices(&[symbol.to_string()])?;
        Ok(prices.remove(symbol))
    }
}

/// Contract catalogue
pub trait ContractRepository: Send + Sync {
    /// Active contracts for one underlying/expiry
    fn active_contracts(
        &self,
        underlying: &str,
        expiry: NaiveDate,
    ) -> OptionsResult<Vec<OptionContract>>;
}

/// Daily factor table, upserted by (underlying, date)
pub trait FactorRepository: Send + Sync {
    fn upsert(&self, record: &OptionDailyFactor) -> OptionsResult<()>;

    fn get(&self, underlying: &str, date: NaiveDate) -> OptionsResult<Option<OptionDailyFactor>>;
}

/// Append-only Greeks series
pub trait GreeksRepository: Send + Sync {
    fn append(&self, rows: &[OptionGreeks]) -> OptionsResult<usize>;
}

/// Destination for synced minute bars
pub trait MinuteBarSink: Send + Sync {
    fn append_bars(&self, contract_code: &str, bars: &[MinuteBar]) -> OptionsResult<usize>;
}

impl<T: PriceStore + ?Sized> PriceStore for Arc<T> {
    fn latest_prices(&self, symbols: &[String]) -> OptionsResult<HashMap<String, PriceRecord>> {
        (**self).latest_prices(symbols)
    }
}

impl<T: ContractRepository + ?Sized> ContractRepository for Arc<T> {
    fn active_contracts(
        &self,
        underlying: &str,
        expiry: NaiveDate,
    ) -> OptionsResult<Vec<OptionContract>> {
        (**self).active_contracts(underlying, expiry)
    }
}

impl<T: FactorRepository + ?Sized> FactorRepository for Arc<T> {
    fn upsert(&self, record: &OptionDailyFactor) -> OptionsResult<()> {
        (**self).upsert(record)
    }

    fn get(&self, underlying: &str, date: NaiveDate) -> OptionsResult<Option<OptionDailyFactor>> {
        (**self).get(underlying, date)
    }
}

impl<T: GreeksRepository + ?Sized> GreeksRepository for Arc<T> {
    fn append(&self, rows: &[OptionGreeks]) -> OptionsResult<usize> {
        (**self).append(rows)
    }
}

impl<T: MinuteBarSink + ?Sized> MinuteBarSink for Arc<T> {
    fn append_bars(&self, contract_code: &str, bars: &[MinuteBar]) -> OptionsResult<usize> {
        (**self).append_bars(contract_code, bars)
    }
}

fn poisoned() -> OptionsError {
    OptionsError::data("store lock poisoned")
}

/// Minute bars plus latest price per symbol
#[derive(Debug, Default)]
pub struct InMemoryPriceStore {
    latest: RwLock<HashMap<String, PriceRecord>>,
    bars: RwLock<HashMap<String, Vec<MinuteBar>>>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest record for a symbol
    pub fn put(&self, record: PriceRecord) -> OptionsResult<()> {
        let mut latest = self.latest.write().map_err(|_| poisoned())?;
        latest.insert(record.symbol.clone(), record);
        Ok(())
    }

    pub fn bars(&self, symbol: &str) -> OptionsResult<Vec<MinuteBar>> {
        let bars = self.bars.read().map_err(|_| poisoned())?;
        Ok(bars.get(symbol).cloned().unwrap_or_default())
    }
}

impl PriceStore for InMemoryPriceStore {
    fn latest_prices(&self, symbols: &[String]) -> OptionsResult<HashMap<String, PriceRecord>> {
        let latest = self.latest.read().map_err(|_| poisoned())?;
        Ok(symbols
            .iter()
            .filter_map(|s| latest.get(s).map(|r| (s.clone(), r.clone())))
            .collect())
    }
}

impl MinuteBarSink for InMemoryPriceStore {
    /// Merge bars by timestamp and advance the latest record
    fn append_bars(&self, contract_code: &str, bars: &[MinuteBar]) -> OptionsResult<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let newest = {
            let mut all = self.bars.write().map_err(|_| poisoned())?;
            let series = all.entry(contract_code.to_string()).or_default();
            let before = series.len();
            for bar in bars {
                match series.binary_search_by_key(&bar.ts, |b| b.ts) {
                    Ok(pos) => series[pos] = bar.clone(),
                    Err(pos) => series.insert(pos, bar.clone()),
                }
            }
            let added = series.len() - before;
            (series.last().cloned(), added)
        };

        let (last, added) = newest;
        if let Some(last) = last {
            let mut latest = self.latest.write().map_err(|_| poisoned())?;
            let stale = latest
                .get(contract_code)
                .map(|r| r.timestamp <= last.ts)
                .unwrap_or(true);
            if stale {
                latest.insert(contract_code.to_string(), PriceRecord::from_bar(contract_code, &last));
            }
        }
        Ok(added)
    }
}

/// Contract catalogue held in memory
#[derive(Debug, Default)]
pub struct InMemoryContractRepository {
    contracts: RwLock<Vec<OptionContract>>,
}

impl InMemoryContractRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a contract by code
    pub fn register(&self, contract: OptionContract) -> OptionsResult<()> {
        let mut contracts = self.contracts.write().map_err(|_| poisoned())?;
        match contracts.iter_mut().find(|c| c.code == contract.code) {
            Some(existing) => *existing = contract,
            None => contracts.push(contract),
        }
        Ok(())
    }

    /// Lifecycle flip performed by the expiry/exercise batch jobs
    pub fn update_state(&self, code: &str, state: ContractState) -> OptionsResult<()> {
        let mut contracts = self.contracts.write().map_err(|_| poisoned())?;
        let contract = contracts
            .iter_mut()
            .find(|c| c.code == code)
            .ok_or_else(|| OptionsError::not_found(format!("contract {}", code)))?;
        if !contract.state.can_transition_to(state) {
            return Err(OptionsError::invalid_input(format!(
                "{} cannot move from {:?} to {:?}",
                code, contract.state, state
            )));
        }
        contract.state = state;
        Ok(())
    }

    pub fn expiries(&self, underlying: &str) -> OptionsResult<Vec<NaiveDate>> {
        let contracts = self.contracts.read().map_err(|_| poisoned())?;
        let mut expiries: Vec<NaiveDate> = contracts
            .iter()
            .filter(|c| c.underlying == underlying && c.is_active())
            .map(|c| c.expiry)
            .collect();
        expiries.sort();
        expiries.dedup();
        Ok(expiries)
    }
}

impl ContractRepository for InMemoryContractRepository {
    fn active_contracts(
        &self,
        underlying: &str,
        expiry: NaiveDate,
    ) -> OptionsResult<Vec<OptionContract>> {
        let contracts = self.contracts.read().map_err(|_| poisoned())?;
        Ok(contracts
            .iter()
            .filter(|c| c.underlying == underlying && c.expiry == expiry && c.is_active())
            .cloned()
            .collect())
    }
}

/// Daily factors held in memory
#[derive(Debug, Default)]
pub struct InMemoryFactorRepository {
    records: RwLock<HashMap<(String, NaiveDate), OptionDailyFactor>>,
}

impl InMemoryFactorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FactorRepository for InMemoryFactorRepository {
    fn upsert(&self, record: &OptionDailyFactor) -> OptionsResult<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.insert(record.key(), record.clone());
        Ok(())
    }

    fn get(&self, underlying: &str, date: NaiveDate) -> OptionsResult<Option<OptionDailyFactor>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(&(underlying.to_string(), date)).cloned())
    }
}

/// Greeks series held in memory
#[derive(Debug, Default)]
pub struct InMemoryGreeksRepository {
    rows: RwLock<Vec<OptionGreeks>>,
}

impl InMemoryGreeksRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<OptionGreeks> {
        self.rows.read().map(|r| r.clone()).unwrap_or_default()
    }
}

impl GreeksRepository for InMemoryGreeksRepository {
    fn append(&self, rows: &[OptionGreeks]) -> OptionsResult<usize> {
        let mut stored = self.rows.write().map_err(|_| poisoned())?;
        stored.extend_from_slice(rows);
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OptionRight, Stage};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(minute: u32, close: f64) -> MinuteBar {
        MinuteBar {
            ts: Utc.with_ymd_and_hms(2025, 3, 3, 1, minute, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 5,
        }
    }

    #[test]
    fn test_latest_prices_batch() {
        let store = InMemoryPriceStore::new();
        store.put(PriceRecord::new("A", Utc::now(), 1.0)).unwrap();
        store.put(PriceRecord::new("B", Utc::now(), 2.0)).unwrap();

        let prices = store
            .latest_prices(&["A".to_string(), "B".to_string(), "C".to_string()])
            .unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices["B"].close, 2.0);
        assert!(store.latest_price("C").unwrap().is_none());
    }

    #[test]
    fn test_append_bars_advances_latest() {
        let store = InMemoryPriceStore::new();
        assert_eq!(store.append_bars("X", &[bar(2, 11.0), bar(1, 10.0)]).unwrap(), 2);
        // Duplicate timestamp replaces, does not add
        assert_eq!(store.append_bars("X", &[bar(2, 12.0)]).unwrap(), 0);

        let bars = store.bars("X").unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].ts < bars[1].ts);
        assert_eq!(store.latest_price("X").unwrap().unwrap().close, 12.0);
    }

    #[test]
    fn test_backfill_keeps_newest_latest() {
        let store = InMemoryPriceStore::new();
        store.append_bars("X", &[bar(5, 15.0)]).unwrap();
        store.append_bars("X", &[bar(3, 13.0), bar(4, 14.0)]).unwrap();

        let latest = store.latest_price("X").unwrap().unwrap();
        assert_eq!(latest.close, 15.0);
        assert_eq!(latest.timestamp, bar(5, 15.0).ts);
        assert_eq!(store.bars("X").unwrap().len(), 3);
    }

    #[test]
    fn test_contract_repository() {
        let repo = InMemoryContractRepository::new();
        let expiry = NaiveDate::from_ymd_opt(2025, 3, 19).unwrap();
        repo.register(OptionContract::new("C1", "TXO", OptionRight::Call, dec!(18000), expiry, dec!(50)))
            .unwrap();
        repo.register(OptionContract::new("P1", "TXO", OptionRight::Put, dec!(18000), expiry, dec!(50)))
            .unwrap();

        assert_eq!(repo.active_contracts("TXO", expiry).unwrap().len(), 2);

        repo.update_state("P1", ContractState::Expired).unwrap();
        assert_eq!(repo.active_contracts("TXO", expiry).unwrap().len(), 1);
        assert!(repo.update_state("P1", ContractState::Active).is_err());
        assert!(repo.update_state("nope", ContractState::Expired).unwrap_err().is_not_found());
        assert_eq!(repo.expiries("TXO").unwrap(), vec![expiry]);
    }

    #[test]
    fn test_factor_upsert_last_writer_wins() {
        let repo = InMemoryFactorRepository::new();
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();

        let mut record = OptionDailyFactor::empty("TXO", date, Stage::One);
        repo.upsert(&record).unwrap();
        record.data_quality_score = 0.9;
        repo.upsert(&record).unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get("TXO", date).unwrap().unwrap().data_quality_score, 0.9);
    }
}
