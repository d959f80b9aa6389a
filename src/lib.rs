//! # Option Factors - Options Analytics Pipeline
//!
//! Turns raw option-market snapshots for futures/stock-linked underlyings
//! into a normalized option chain, daily sentiment/risk factors and
//! per-contract Black-Scholes Greeks.
//!
//! ## Key Components
//!
//! - **Pricing**: Black-Scholes price, Greeks and implied volatility
//! - **Data Sources**: broker-backed live chains, offline placeholder,
//!   static replay
//! - **Factors**: Put/Call ratio, ATM IV, skew, term structure, max pain,
//!   exposure factors
//! - **Chain Assembly**: contracts plus latest prices, split and sorted
//! - **Stage Gate**: staged rollout of factor groups (stage 1/2/3)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use option_factors::prelude::*;
//!
//! let source = StaticOptionSource::new(Vec::new());
//! let prices = InMemoryPriceStore::new();
//! let gate = StageGate::new(JsonConfigStore::new("./data/system_config.json"));
//!
//! let calculator = FactorCalculator::new(&source, &prices, gate.snapshot());
//! let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
//! let record = calculator.calculate_daily_factors("TXO", date);
//! println!("PCR(OI): {:?}", record.pcr_open_interest.get());
//! ```
//!
//! ## What This Crate Does NOT Do
//!
//! - Execute orders or track portfolios
//! - Serve HTTP or schedule jobs itself
//! - Generate trading signals

pub mod analytics;
pub mod config;
pub mod core;
pub mod data;
pub mod jobs;
pub mod models;
pub mod stage;

/// Formula version stamped on every stored factor and Greeks row
///
/// Bump whenever a formula changes.
pub const CALCULATION_VERSION: &str = "1.0.0";

/// Prelude with commonly used types
pub mod prelude {
    // Core types
    pub use crate::core::{
        ChainItem, ChainSnapshotRow, ContractFold, ContractState, FactorValue, Greeks,
        MinuteBar, OptionChainResponse, OptionContract, OptionDailyFactor, OptionGreeks,
        OptionRight, OptionsError, OptionsResult, PriceRecord, Stage, UnderlyingKind,
    };

    // Pricing
    pub use crate::models::{
        greeks as bs_greeks, implied_volatility, implied_volatility_with, norm_cdf, norm_pdf,
        price as bs_price, IvSolverParams,
    };

    // Data sources and stores
    pub use crate::data::{
        BrokerClient, BrokerOptionSource, ContractRepository, FactorRepository,
        GreeksRepository, InMemoryContractRepository, InMemoryFactorRepository,
        InMemoryGreeksRepository, InMemoryPriceStore, JsonFactorStore, MinuteBarSink,
        OfflineOptionSource, OptionClass, OptionDataSource, PriceStore, RestBrokerClient,
        ScidPriceStore, StaticOptionSource,
    };

    // Analytics
    pub use crate::analytics::{FactorCalculator, GreeksCalculator, OptionChainAssembler};

    // Stage gate and configuration
    pub use crate::config::PipelineConfig;
    pub use crate::stage::{
        ConfigStore, InMemoryConfigStore, JsonConfigStore, StageGate, StageSnapshot,
    };

    // Jobs
    pub use crate::jobs::{DailyFactorJob, GreeksJob, JobSummary, MinuteBarSync};
}

// Re-export main types at crate root
pub use crate::core::{OptionsError, OptionsResult};
pub use crate::stage::{StageGate, StageSnapshot};
