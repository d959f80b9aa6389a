//! Option data source abstraction
//!
//! Decouples the pipeline from any specific broker or offline feed.

use chrono::{DateTime, NaiveDate, Utc};

use crate::core::{ChainSnapshotRow, MinuteBar};

/// Capability set every option data source provides
///
/// Implementations never fail outward: on any error they log the cause and
/// return an empty result, so "no data" and "error" differ only in the logs.
pub trait OptionDataSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Current chain snapshot for an underlying, excluding contracts that
    /// expired before `date`
    fn get_option_chain(&self, underlying: &str, date: NaiveDate) -> Vec<ChainSnapshotRow>;

    /// Historical minute bars for one contract, ascending by time
    fn get_minute_bars(
        &self,
        contract_code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<MinuteBar>;

    fn is_available(&self) -> bool;
}

impl<T: OptionDataSource + ?Sized> OptionDataSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_option_chain(&self, underlying: &str, date: NaiveDate) -> Vec<ChainSnapshotRow> {
        (**self).get_option_chain(underlying, date)
    }

    fn get_minute_bars(
        &self,
        contract_code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<MinuteBar> {
        (**self).get_minute_bars(contract_code, start, end)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Offline columnar-store source
///
/// Placeholder for a historical store; reports itself unavailable and
/// returns no data.
#[derive(Debug, Clone, Default)]
pub struct OfflineOptionSource;

impl OfflineOptionSource {
    pub fn new() -> Self {
        Self
    }
}

impl OptionDataSource for OfflineOptionSource {
    fn name(&self) -> &str {
        "offline"
    }

    fn get_option_chain(&self, underlying: &str, date: NaiveDate) -> Vec<ChainSnapshotRow> {
        tracing::warn!(
            "Offline source has no chain for {} on {}: source unavailable",
            underlying,
            date
        );
        Vec::new()
    }

    fn get_minute_bars(
        &self,
        contract_code: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Vec<MinuteBar> {
        tracing::warn!("Offline source has no bars for {}: source unavailable", contract_code);
        Vec::new()
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Fixed chain, for replaying a captured snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticOptionSource {
    rows: Vec<ChainSnapshotRow>,
    bars: std::collections::HashMap<String, Vec<MinuteBar>>,
}

impl StaticOptionSource {
    pub fn new(rows: Vec<ChainSnapshotRow>) -> Self {
        Self {
            rows,
            bars: Default::default(),
        }
    }

    pub fn with_bars(mut self, contract_code: impl Into<String>, bars: Vec<MinuteBar>) -> Self {
        self.bars.insert(contract_code.into(), bars);
        self
    }
}

impl OptionDataSource for StaticOptionSource {
    fn name(&self) -> &str {
        "static"
    }

    fn get_option_chain(&self, _underlying: &str, date: NaiveDate) -> Vec<ChainSnapshotRow> {
        self.rows
            .iter()
            .filter(|r| r.expiry >= date)
            .cloned()
            .collect()
    }

    fn get_minute_bars(
        &self,
        contract_code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<MinuteBar> {
        self.bars
            .get(contract_code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.ts >= start && b.ts <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_source_is_unavailable() {
        let source = OfflineOptionSource::new();
        assert!(!source.is_available());
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert!(source.get_option_chain("TXO", date).is_empty());
        assert!(source.get_minute_bars("TXO18000C5", Utc::now(), Utc::now()).is_empty());
    }

    #[test]
    fn test_boxed_source_delegates() {
        let source: Box<dyn OptionDataSource> = Box::new(OfflineOptionSource::new());
        assert_eq!(source.name(), "offline");
        assert!(!source.is_available());
    }
}
