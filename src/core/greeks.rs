//! Option Greeks
//!
//! First and second order sensitivities, plus the persisted per-contract row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Black-Scholes Greeks (sensitivities)
///
/// Theta and charm are per calendar day, vega and rho per 1 percentage point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// Delta: dV/dS (sensitivity to spot)
    pub delta: f64,
    /// Gamma: d²V/dS² (sensitivity of delta to spot)
    pub gamma: f64,
    /// Theta: dV/dt (time decay, per day)
    pub theta: f64,
    /// Vega: dV/dσ (per 1% vol move)
    pub vega: f64,
    /// Rho: dV/dr (per 1% rate move)
    pub rho: f64,
    /// Vanna: d²V/dSdσ (sensitivity of delta to vol)
    pub vanna: f64,
    /// Charm: d²V/dSdt (delta decay per day)
    pub charm: Option<f64>,
}

impl Greeks {
    pub fn new(delta: f64, gamma: f64, theta: f64, vega: f64, rho: f64, vanna: f64) -> Self {
        Self {
            delta,
            gamma,
            theta,
            vega,
            rho,
            vanna,
            charm: None,
        }
    }

    /// Position Greeks for `factor` units (open interest times multiplier)
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            theta: self.theta * factor,
            vega: self.vega * factor,
            rho: self.rho * factor,
            vanna: self.vanna * factor,
            charm: self.charm.map(|v| v * factor),
        }
    }

    /// All first-order and cross terms are finite numbers
    pub fn is_finite(&self) -> bool {
        [
            self.delta, self.gamma, self.theta, self.vega, self.rho, self.vanna,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Persisted Greeks for one contract at one instant (append-only series)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionGreeks {
    pub contract_code: String,
    pub timestamp: DateTime<Utc>,
    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub vega: Option<f64>,
    pub rho: Option<f64>,
    pub vanna: Option<f64>,
    pub charm: Option<f64>,
    /// Inputs used, kept for auditability
    pub spot: Option<f64>,
    pub volatility: Option<f64>,
    pub risk_free_rate: f64,
    pub time_to_expiry: Option<f64>,
    pub calculation_version: String,
}

impl OptionGreeks {
    /// Row with every Greek absent
    pub fn absent(
        contract_code: impl Into<String>,
        timestamp: DateTime<Utc>,
        risk_free_rate: f64,
    ) -> Self {
        Self {
            contract_code: contract_code.into(),
            timestamp,
            delta: None,
            gamma: None,
            theta: None,
            vega: None,
            rho: None,
            vanna: None,
            charm: None,
            spot: None,
            volatility: None,
            risk_free_rate,
            time_to_expiry: None,
            calculation_version: crate::CALCULATION_VERSION.to_string(),
        }
    }

    pub fn with_greeks(mut self, greeks: &Greeks) -> Self {
        self.delta = Some(greeks.delta);
        self.gamma = Some(greeks.gamma);
        self.theta = Some(greeks.theta);
        self.vega = Some(greeks.vega);
        self.rho = Some(greeks.rho);
        self.vanna = Some(greeks.vanna);
        self.charm = greeks.charm;
        self
    }

    pub fn has_greeks(&self) -> bool {
        self.delta.is_some()
    }
}
