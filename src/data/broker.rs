//! Broker-backed live option source
//!
//! The broker SDK sits behind [`BrokerClient`]. [`BrokerOptionSource`]
//! enumerates the full contract catalogue for an option class, then pulls
//! price snapshots in batches, skipping whatever fails along the way.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::source::OptionDataSource;
use super::symbology::{parse_option_code, OptionClass};
use crate::config::SourceConfig;
use crate::core::{
    ChainSnapshotRow, ContractFold, MinuteBar, OptionRight, OptionsError, OptionsResult,
};

/// Contract as listed in the broker's catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerContract {
    pub code: String,
    #[serde(default)]
    pub strike: Option<f64>,
    /// Right label as the broker reports it ("C", "OptionCall", ...)
    #[serde(default)]
    pub right: Option<String>,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub multiplier: Option<f64>,
}

/// Point-in-time quote for one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSnapshot {
    pub code: String,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub open_interest: Option<u64>,
}

/// Broker SDK boundary
pub trait BrokerClient: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Every listed contract of an option class
    fn option_contracts(&self, class: OptionClass) -> OptionsResult<Vec<BrokerContract>>;

    /// Snapshots for a batch of contract codes
    fn snapshots(&self, codes: &[String]) -> OptionsResult<Vec<BrokerSnapshot>>;

    fn minute_bars(
        &self,
        code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> OptionsResult<Vec<MinuteBar>>;
}

/// Contract metadata normalized for snapshot assembly
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContract {
    pub code: String,
    pub right: OptionRight,
    pub strike: f64,
    pub expiry: NaiveDate,
    pub multiplier: f64,
}

/// Normalize one catalogue entry
///
/// Right and strike come from broker metadata, falling back to the contract
/// code. A contract whose right cannot be derived is dropped.
pub fn resolve_contract(
    contract: &BrokerContract,
    class: OptionClass,
    reference: NaiveDate,
) -> OptionsResult<ResolvedContract> {
    let parsed = parse_option_code(&contract.code);

    let right = contract
        .right
        .as_deref()
        .and_then(OptionRight::from_label)
        .or_else(|| parsed.as_ref().map(|p| p.right))
        .ok_or_else(|| OptionsError::data(format!("cannot derive right for {}", contract.code)))?;

    let strike = contract
        .strike
        .filter(|s| s.is_finite() && *s > 0.0)
        .or_else(|| parsed.as_ref().map(|p| p.strike))
        .ok_or_else(|| OptionsError::data(format!("no strike for {}", contract.code)))?;

    let expiry = contract
        .delivery_date
        .or_else(|| parsed.as_ref().and_then(|p| p.monthly_expiry(reference)))
        .ok_or_else(|| OptionsError::data(format!("no expiry for {}", contract.code)))?;

    Ok(ResolvedContract {
        code: contract.code.clone(),
        right,
        strike,
        expiry,
        multiplier: contract.multiplier.unwrap_or_else(|| class.multiplier()),
    })
}

/// Outcome counters for one chain fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchStats {
    pub listed: usize,
    /// Dropped during metadata resolution
    pub unresolved: usize,
    pub requested: usize,
    pub fetched: usize,
    pub failed: usize,
    /// Stopped early on the wall-clock budget
    pub truncated: bool,
}

impl FetchStats {
    pub fn success_rate(&self) -> f64 {
        if self.requested == 0 {
            0.0
        } else {
            self.fetched as f64 / self.requested as f64
        }
    }
}

/// Live option source backed by a broker client
pub struct BrokerOptionSource<C: BrokerClient> {
    client: C,
    config: SourceConfig,
}

impl<C: BrokerClient> BrokerOptionSource<C> {
    pub fn new(client: C, config: SourceConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch a chain snapshot and report what happened
    pub fn fetch_chain(
        &self,
        underlying: &str,
        date: NaiveDate,
    ) -> (Vec<ChainSnapshotRow>, FetchStats) {
        let mut stats = FetchStats::default();

        let Some(class) = OptionClass::resolve(underlying) else {
            tracing::warn!("Unsupported underlying {}, no option class", underlying);
            return (Vec::new(), stats);
        };

        if !self.client.is_connected() {
            tracing::warn!("Broker not connected, cannot fetch {} chain", class);
            return (Vec::new(), stats);
        }

        let listed = match self.client.option_contracts(class) {
            Ok(contracts) => contracts,
            Err(e) => {
                tracing::warn!("Failed to list {} contracts: {}", class, e);
                return (Vec::new(), stats);
            }
        };
        stats.listed = listed.len();

        let resolved = ContractFold::collect(
            listed
                .iter()
                .map(|c| (c.code.as_str(), resolve_contract(c, class, date))),
        );
        stats.unresolved = resolved.failed;

        let contracts: Vec<ResolvedContract> = resolved
            .ok
            .into_iter()
            .filter(|c| c.expiry >= date)
            .collect();
        stats.requested = contracts.len();

        tracing::info!(
            "Fetching {} chain: {} listed, {} unresolved, {} live",
            class,
            stats.listed,
            stats.unresolved,
            stats.requested
        );

        let started = Instant::now();
        let budget = Duration::from_secs(self.config.max_fetch_secs);
        let batch_size = self.config.batch_size.max(1);
        let progress_every = self.config.progress_every.max(1);
        let mut rows = Vec::with_capacity(contracts.len());
        let mut processed = 0usize;

        for batch in contracts.chunks(batch_size) {
            if started.elapsed() > budget {
                stats.truncated = true;
                tracing::warn!(
                    "{} chain fetch exceeded {}s budget after {}/{} contracts, returning partial chain",
                    class,
                    self.config.max_fetch_secs,
                    processed,
                    stats.requested
                );
                break;
            }

            let codes: Vec<String> = batch.iter().map(|c| c.code.clone()).collect();
            match self.client.snapshots(&codes) {
                Ok(snapshots) => {
                    let by_code: HashMap<&str, &BrokerSnapshot> =
                        snapshots.iter().map(|s| (s.code.as_str(), s)).collect();
                    for contract in batch {
                        match by_code.get(contract.code.as_str()) {
                            Some(snap) => {
                                rows.push(snapshot_row(contract, snap));
                                stats.fetched += 1;
                            }
                            None => {
                                tracing::debug!("No snapshot returned for {}", contract.code);
                                stats.failed += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Snapshot batch of {} failed, skipping: {}", batch.len(), e);
                    stats.failed += batch.len();
                }
            }

            let before = processed;
            processed += batch.len();
            if processed / progress_every > before / progress_every {
                tracing::info!(
                    "{} progress: {}/{} contracts processed",
                    class,
                    processed,
                    stats.requested
                );
            }
        }

        tracing::info!(
            "{} chain fetch done: {}/{} contracts ({:.1}% success) in {:.1}s",
            class,
            stats.fetched,
            stats.requested,
            stats.success_rate() * 100.0,
            started.elapsed().as_secs_f64()
        );

        (rows, stats)
    }
}

fn snapshot_row(contract: &ResolvedContract, snap: &BrokerSnapshot) -> ChainSnapshotRow {
    ChainSnapshotRow {
        contract_code: contract.code.clone(),
        right: contract.right,
        strike: contract.strike,
        expiry: contract.expiry,
        last: snap.close,
        bid: snap.bid,
        ask: snap.ask,
        volume: snap.volume.unwrap_or(0),
        open_interest: snap.open_interest.unwrap_or(0),
        multiplier: contract.multiplier,
    }
}

impl<C: BrokerClient> OptionDataSource for BrokerOptionSource<C> {
    fn name(&self) -> &str {
        "broker"
    }

    fn get_option_chain(&self, underlying: &str, date: NaiveDate) -> Vec<ChainSnapshotRow> {
        self.fetch_chain(underlying, date).0
    }

    fn get_minute_bars(
        &self,
        contract_code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<MinuteBar> {
        if start > end {
            tracing::warn!("Empty bar range for {}: {} > {}", contract_code, start, end);
            return Vec::new();
        }
        match self.client.minute_bars(contract_code, start, end) {
            Ok(mut bars) => {
                bars.retain(|b| b.ts >= start && b.ts <= end);
                bars.sort_by_key(|b| b.ts);
                bars
            }
            Err(e) => {
                tracing::warn!("Failed to fetch bars for {}: {}", contract_code, e);
                Vec::new()
            }
        }
    }

    fn is_available(&self) -> bool {
        self.client.is_connected()
    }
}
