//! Pipeline configuration
//!
//! Static settings loaded once at startup. Stage flags are runtime state and
//! live in the stage gate's config store instead.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{OptionsError, OptionsResult};
use crate::models::IvSolverParams;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub factors: FactorConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl PipelineConfig {
    /// Load from a JSON file; missing sections take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> OptionsResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            OptionsError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        tracing::info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> OptionsResult<()> {
        if !self.pricing.risk_free_rate.is_finite() {
            return Err(OptionsError::config("risk_free_rate must be finite"));
        }
        if self.pricing.iv_tolerance <= 0.0 || self.pricing.iv_max_iterations == 0 {
            return Err(OptionsError::config(
                "IV solver needs a positive tolerance and at least one iteration",
            ));
        }
        if self.source.batch_size == 0 {
            return Err(OptionsError::config("batch_size must be at least 1"));
        }
        if !(0.0 < self.factors.skew_delta && self.factors.skew_delta < 0.5) {
            return Err(OptionsError::config("skew_delta must be in (0, 0.5)"));
        }
        Ok(())
    }
}

/// Pricing inputs shared by the factor calculator and the Greeks job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Continuously compounded risk-free rate
    /// Default: 0.015
    pub risk_free_rate: f64,

    /// Newton-Raphson iteration cap
    /// Default: 100
    pub iv_max_iterations: usize,

    /// Absolute price tolerance for the IV solver
    /// Default: 1e-4
    pub iv_tolerance: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.015,
            iv_max_iterations: 100,
            iv_tolerance: 1e-4,
        }
    }
}

impl PricingConfig {
    pub fn solver(&self) -> IvSolverParams {
        IvSolverParams {
            max_iterations: self.iv_max_iterations,
            tolerance: self.iv_tolerance,
        }
    }
}

/// Broker gateway and chain fetch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Broker gateway base URL
    pub base_url: String,

    /// Per-request timeout
    /// Default: 10
    pub timeout_secs: u64,

    /// Contracts per snapshot request
    /// Default: 50
    pub batch_size: usize,

    /// Log progress every N contracts
    /// Default: 100
    pub progress_every: usize,

    /// Wall-clock budget for one chain fetch; the rest is skipped
    /// Default: 600
    pub max_fetch_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api/v1".to_string(),
            timeout_secs: 10,
            batch_size: 50,
            progress_every: 100,
            max_fetch_secs: 600,
        }
    }
}

/// Factor definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorConfig {
    /// Absolute delta of the wings used for skew
    /// Default: 0.25
    pub skew_delta: f64,
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self { skew_delta: 0.25 }
    }
}

/// Local stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for the JSON factor store
    pub factor_dir: PathBuf,
    /// Key-value file backing the stage gate
    pub config_path: PathBuf,
    /// Directory of intraday `.scid` files
    pub scid_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            factor_dir: PathBuf::from("./data/factors"),
            config_path: PathBuf::from("./data/system_config.json"),
            scid_dir: None,
        }
    }
}
