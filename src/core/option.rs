//! Option contract definitions
//!
//! Contract metadata as registered from a broker's contract catalogue.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Seconds in a pricing year (calendar-day convention, matches theta / 365)
pub const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;

/// Final settlement time on expiry day, in UTC (13:30 exchange time, UTC+8)
pub const SETTLEMENT_TIME_UTC: (u32, u32) = (5, 30);

/// Whole calendar days between two dates, in years
pub fn year_fraction(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64 / 365.0
}

/// Final settlement instant of an expiry date
pub fn settlement_at(expiry: NaiveDate) -> DateTime<Utc> {
    let (h, m) = SETTLEMENT_TIME_UTC;
    let time = NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
    expiry.and_time(time).and_utc()
}

/// Years from an instant to settlement on `expiry`; negative once settled
pub fn time_to_settlement(expiry: NaiveDate, as_of: DateTime<Utc>) -> f64 {
    (settlement_at(expiry) - as_of).num_seconds() as f64 / SECONDS_PER_YEAR
}

/// Option right (Call or Put)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    /// Intrinsic value at given spot
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionRight::Call => (spot - strike).max(0.0),
            OptionRight::Put => (strike - spot).max(0.0),
        }
    }

    /// Parse broker metadata ("C", "call", "OptionCall", ...)
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        match label.as_str() {
            "c" | "call" | "optioncall" => Some(OptionRight::Call),
            "p" | "put" | "optionput" => Some(OptionRight::Put),
            _ => None,
        }
    }
}

/// What the option is written on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnderlyingKind {
    Equity,
    Futures,
}

/// Contract lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractState {
    Active,
    Expired,
    Exercised,
}

impl ContractState {
    /// Lifecycle transitions are one-way: active -> {expired, exercised}
    pub fn can_transition_to(&self, next: ContractState) -> bool {
        matches!(
            (self, next),
            (ContractState::Active, ContractState::Expired)
                | (ContractState::Active, ContractState::Exercised)
        )
    }
}

/// Option contract specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Exchange contract code (e.g. "TXO18000L4")
    pub code: String,
    /// Underlying id (e.g. "TXO", "MXO")
    pub underlying: String,
    pub underlying_kind: UnderlyingKind,
    pub right: OptionRight,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub state: ContractState,
    /// Final settlement price, attached by the expiry batch job
    pub settlement_price: Option<Decimal>,
    /// Index points to currency (e.g. 50 for TXO)
    pub multiplier: Decimal,
    pub tick_size: Decimal,
}

impl OptionContract {
    pub fn new(
        code: impl Into<String>,
        underlying: impl Into<String>,
        right: OptionRight,
        strike: Decimal,
        expiry: NaiveDate,
        multiplier: Decimal,
    ) -> Self {
        Self {
            code: code.into(),
            underlying: underlying.into(),
            underlying_kind: UnderlyingKind::Futures,
            right,
            strike,
            expiry,
            state: ContractState::Active,
            settlement_price: None,
            multiplier,
            tick_size: Decimal::new(1, 1),
        }
    }

    /// Strike as f64 for pricing
    pub fn strike_f64(&self) -> f64 {
        self.strike.to_f64().unwrap_or(f64::NAN)
    }

    pub fn is_active(&self) -> bool {
        self.state == ContractState::Active
    }

    /// Settlement instant on expiry day
    pub fn expiry_at(&self) -> DateTime<Utc> {
        settlement_at(self.expiry)
    }

    /// Time to expiry in years from an instant; negative once settled
    pub fn time_to_expiry_at(&self, as_of: DateTime<Utc>) -> f64 {
        time_to_settlement(self.expiry, as_of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn contract() -> OptionContract {
        OptionContract::new(
            "TXO18000C5",
            "TXO",
            OptionRight::Call,
            dec!(18000),
            NaiveDate::from_ymd_opt(2025, 3, 19).unwrap(),
            dec!(50),
        )
    }

    #[test]
    fn test_option_right() {
        assert_eq!(OptionRight::Call.intrinsic(110.0, 100.0), 10.0);
        assert_eq!(OptionRight::Put.intrinsic(90.0, 100.0), 10.0);
        assert_eq!(OptionRight::Call.intrinsic(90.0, 100.0), 0.0);

        assert_eq!(OptionRight::from_label("OptionPut"), Some(OptionRight::Put));
        assert_eq!(OptionRight::from_label(" C "), Some(OptionRight::Call));
        assert_eq!(OptionRight::from_label("future"), None);
    }

    #[test]
    fn test_lifecycle_is_one_way() {
        assert!(ContractState::Active.can_transition_to(ContractState::Expired));
        assert!(ContractState::Active.can_transition_to(ContractState::Exercised));
        assert!(!ContractState::Expired.can_transition_to(ContractState::Active));
        assert!(!ContractState::Exercised.can_transition_to(ContractState::Expired));
    }

    #[test]
    fn test_time_to_expiry() {
        let opt = contract();
        let from = NaiveDate::from_ymd_opt(2025, 2, 17).unwrap();
        assert!((year_fraction(from, opt.expiry) - 30.0 / 365.0).abs() < 1e-12);

        let after = Utc.with_ymd_and_hms(2025, 3, 19, 6, 0, 0).unwrap();
        assert!(opt.time_to_expiry_at(after) < 0.0);

        let before = Utc.with_ymd_and_hms(2025, 3, 18, 5, 30, 0).unwrap();
        assert!((opt.time_to_expiry_at(before) - 1.0 / 365.0).abs() < 1e-9);
    }
}
