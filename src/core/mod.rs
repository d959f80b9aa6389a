//! Core data types for the options pipeline
//!
//! Defines fundamental types:
//! - OptionContract: code, strike, expiry, right, lifecycle
//! - ChainSnapshotRow / PriceRecord / MinuteBar: market data
//! - Greeks / OptionGreeks: sensitivities
//! - OptionDailyFactor: stage-gated daily factors
//! - OptionChainResponse: assembled chain
//! - ContractFold: per-contract failure accounting

pub mod chain;
pub mod error;
pub mod factor;
pub mod fold;
pub mod greeks;
pub mod option;
pub mod quote;

pub use chain::*;
pub use error::*;
pub use factor::*;
pub use fold::*;
pub use greeks::*;
pub use option::*;
pub use quote::*;
