//! Scheduled jobs
//!
//! Thin runners a scheduler calls once per trigger. Each reads the stage
//! configuration once, then works contract by contract or underlying by
//! underlying, logging and counting failures instead of aborting.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::analytics::{FactorCalculator, GreeksCalculator};
use crate::config::PipelineConfig;
use crate::core::{ContractFold, OptionsResult};
use crate::data::{
    ContractRepository, FactorRepository, GreeksRepository, MinuteBarSink, OptionDataSource,
    PriceStore,
};
use crate::stage::{ConfigStore, StageGate};

/// Outcome of one daily factor run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobSummary {
    pub date: Option<NaiveDate>,
    pub processed: usize,
    pub stored: usize,
    /// Stored, but the source returned no contracts
    pub empty: usize,
    pub failed: usize,
}

impl JobSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Computes and upserts daily factors for every enabled underlying
pub struct DailyFactorJob<D, P, F, S: ConfigStore> {
    source: D,
    prices: P,
    factors: F,
    gate: StageGate<S>,
    config: PipelineConfig,
}

impl<D, P, F, S> DailyFactorJob<D, P, F, S>
where
    D: OptionDataSource,
    P: PriceStore,
    F: FactorRepository,
    S: ConfigStore,
{
    pub fn new(source: D, prices: P, factors: F, gate: StageGate<S>) -> Self {
        Self {
            source,
            prices,
            factors,
            gate,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn run(&self, date: NaiveDate) -> JobSummary {
        let snapshot = self.gate.snapshot();
        let mut summary = JobSummary {
            date: Some(date),
            ..Default::default()
        };

        if !self.source.is_available() {
            tracing::warn!("{} source reports unavailable, factors will be empty", self.source.name());
        }
        tracing::info!(
            "Daily factor run for {}: {} underlyings at {}",
            date,
            snapshot.enabled_underlyings.len(),
            snapshot.stage
        );

        let calculator = FactorCalculator::new(&self.source, &self.prices, snapshot.clone())
            .with_config(&self.config);

        for underlying in &snapshot.enabled_underlyings {
            summary.processed += 1;
            let record = calculator.calculate_daily_factors(underlying, date);

            match self.factors.upsert(&record) {
                Ok(()) => {
                    summary.stored += 1;
                    if record.contract_count == 0 {
                        summary.empty += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to store factors for {} {}: {}", underlying, date, e);
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            "Daily factor run for {} done: {}/{} stored, {} empty, {} failed",
            date,
            summary.stored,
            summary.processed,
            summary.empty,
            summary.failed
        );
        summary
    }
}

/// Pulls minute bars for a contract list when minute sync is enabled
pub struct MinuteBarSync<D, K, S: ConfigStore> {
    source: D,
    sink: K,
    gate: StageGate<S>,
}

impl<D, K, S> MinuteBarSync<D, K, S>
where
    D: OptionDataSource,
    K: MinuteBarSink,
    S: ConfigStore,
{
    pub fn new(source: D, sink: K, gate: StageGate<S>) -> Self {
        Self { source, sink, gate }
    }

    /// Sync `[start, end]`; returns the number of new bars stored
    pub fn run(&self, contracts: &[String], start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
        if !self.gate.is_minute_sync_enabled() {
            tracing::info!("Minute sync disabled, skipping {} contracts", contracts.len());
            return 0;
        }

        let fold = ContractFold::collect(contracts.iter().map(|code| {
            let bars = self.source.get_minute_bars(code, start, end);
            (code, self.sink.append_bars(code, &bars))
        }));
        let stored: usize = fold.ok.iter().sum();

        tracing::info!(
            "Minute sync {} - {}: {} bars for {}/{} contracts",
            start,
            end,
            stored,
            fold.ok.len(),
            fold.total()
        );
        stored
    }
}

/// Computes and appends Greeks rows for one underlying/expiry
pub struct GreeksJob<R, P, G, S: ConfigStore> {
    contracts: R,
    prices: P,
    rows: G,
    gate: StageGate<S>,
    calculator: GreeksCalculator,
}

impl<R, P, G, S> GreeksJob<R, P, G, S>
where
    R: ContractRepository,
    P: PriceStore,
    G: GreeksRepository,
    S: ConfigStore,
{
    pub fn new(contracts: R, prices: P, rows: G, gate: StageGate<S>) -> Self {
        Self {
            contracts,
            prices,
            rows,
            gate,
            calculator: GreeksCalculator::default(),
        }
    }

    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.calculator = GreeksCalculator::new(config.pricing.clone());
        self
    }

    /// Returns the number of rows appended
    ///
    /// Contracts without a price record are skipped; priced contracts whose
    /// Greeks do not resolve are still stored, with absent Greeks.
    pub fn run(
        &self,
        underlying: &str,
        expiry: NaiveDate,
        as_of: DateTime<Utc>,
    ) -> OptionsResult<usize> {
        let snapshot = self.gate.snapshot();
        if !snapshot.greeks_enabled || !snapshot.is_enabled(underlying) {
            tracing::info!("Greeks disabled for {}, skipping", underlying);
            return Ok(0);
        }

        let contracts = self.contracts.active_contracts(underlying, expiry)?;
        let codes: Vec<String> = contracts.iter().map(|c| c.code.clone()).collect();
        let prices = self.prices.latest_prices(&codes)?;
        let spot = match self.prices.latest_price(underlying) {
            Ok(record) => record.map(|r| r.close),
            Err(e) => {
                tracing::warn!("Spot lookup for {} failed: {}", underlying, e);
                None
            }
        };
        if spot.is_none() {
            tracing::warn!("No spot for {}, rows stored without Greeks", underlying);
        }

        let fold = ContractFold::collect(contracts.iter().map(|contract| {
            let row = prices
                .get(&contract.code)
                .map(|price| self.calculator.compute(contract, price, spot, as_of))
                .ok_or("no price record");
            (contract.code.as_str(), row)
        }));

        let appended = self.rows.append(&fold.ok)?;
        tracing::info!(
            "Greeks for {} {}: {} rows, {} with Greeks, {} unpriced",
            underlying,
            expiry,
            appended,
            fold.ok.iter().filter(|r| r.has_greeks()).count(),
            fold.failed
        );
        Ok(appended)
    }
}
