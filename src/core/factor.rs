//! Daily factor record
//!
//! One row per (underlying, trading date). Fields added by later rollout
//! stages are wrapped in [`FactorValue`] so that "not computed" can never be
//! confused with "computed as zero".

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Feature rollout stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Stage {
    /// PCR and ATM IV
    One = 1,
    /// Skew, term structure, max pain, OI totals
    Two = 2,
    /// Delta/gamma/vanna exposure
    Three = 3,
}

impl Stage {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Stage::One),
            2 => Some(Stage::Two),
            3 => Some(Stage::Three),
            _ => None,
        }
    }

    pub fn level(&self) -> u8 {
        *self as u8
    }

    /// Whether fields introduced at `required` may be computed
    pub fn permits(&self, required: Stage) -> bool {
        *self >= required
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> u8 {
        stage.level()
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Stage::from_level(level).ok_or_else(|| format!("invalid stage {}", level))
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage {}", self.level())
    }
}

/// A factor field that may be disabled by the stage gate or not computable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FactorValue<T> {
    /// The field's stage is not enabled
    Gated,
    /// Enabled, but the data did not support a value
    Unavailable,
    Value(T),
}

impl<T> FactorValue<T> {
    /// Absent value for a field introduced at `required`
    pub fn absent(stage: Stage, required: Stage) -> Self {
        if stage.permits(required) {
            FactorValue::Unavailable
        } else {
            FactorValue::Gated
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FactorValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, FactorValue::Value(_))
    }

    pub fn is_gated(&self) -> bool {
        matches!(self, FactorValue::Gated)
    }
}

impl<T: Copy> FactorValue<T> {
    pub fn get(&self) -> Option<T> {
        self.value().copied()
    }

    /// Re-derive gating for a field introduced at `required`
    ///
    /// Values are kept as they are; only absence is reclassified.
    pub fn regated(self, stage: Stage, required: Stage) -> Self {
        match self {
            FactorValue::Value(v) => FactorValue::Value(v),
            _ => FactorValue::absent(stage, required),
        }
    }
}

impl<T> From<Option<T>> for FactorValue<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => FactorValue::Value(v),
            None => FactorValue::Unavailable,
        }
    }
}

impl<T> Default for FactorValue<T> {
    fn default() -> Self {
        FactorValue::Unavailable
    }
}

impl<T: Serialize> Serialize for FactorValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FactorValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(FactorValue::from)
    }
}

/// Daily sentiment/risk factors for one underlying
///
/// Absent fields are stored as `null`; on load, nulls in fields above the
/// record's stage come back as [`FactorValue::Gated`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub struct OptionDailyFactor {
    pub underlying: String,
    pub date: NaiveDate,
    /// Stage in force when the record was computed
    pub stage: Stage,
    /// Spot used for ATM selection
    pub spot: Option<f64>,
    pub contract_count: usize,

    // Stage 1
    pub pcr_volume: FactorValue<f64>,
    pub pcr_open_interest: FactorValue<f64>,
    pub atm_iv: FactorValue<f64>,

    // Stage 2
    pub iv_skew: FactorValue<f64>,
    pub iv_term_structure: FactorValue<f64>,
    pub max_pain_strike: FactorValue<f64>,
    pub total_call_oi: FactorValue<u64>,
    pub total_put_oi: FactorValue<u64>,

    // Stage 3
    pub avg_atm_call_delta: FactorValue<f64>,
    pub avg_atm_put_delta: FactorValue<f64>,
    pub gamma_exposure: FactorValue<f64>,
    pub vanna_exposure: FactorValue<f64>,

    /// Fraction of snapshot contracts with a usable price
    pub data_quality_score: f64,
    pub calculation_version: String,
}

impl Serialize for OptionDailyFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OptionDailyFactor::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for OptionDailyFactor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        OptionDailyFactor::deserialize(deserializer).map(OptionDailyFactor::regate)
    }
}

impl OptionDailyFactor {
    /// Record with every factor absent
    pub fn empty(underlying: impl Into<String>, date: NaiveDate, stage: Stage) -> Self {
        Self {
            underlying: underlying.into(),
            date,
            stage,
            spot: None,
            contract_count: 0,
            pcr_volume: FactorValue::absent(stage, Stage::One),
            pcr_open_interest: FactorValue::absent(stage, Stage::One),
            atm_iv: FactorValue::absent(stage, Stage::One),
            iv_skew: FactorValue::absent(stage, Stage::Two),
            iv_term_structure: FactorValue::absent(stage, Stage::Two),
            max_pain_strike: FactorValue::absent(stage, Stage::Two),
            total_call_oi: FactorValue::absent(stage, Stage::Two),
            total_put_oi: FactorValue::absent(stage, Stage::Two),
            avg_atm_call_delta: FactorValue::absent(stage, Stage::Three),
            avg_atm_put_delta: FactorValue::absent(stage, Stage::Three),
            gamma_exposure: FactorValue::absent(stage, Stage::Three),
            vanna_exposure: FactorValue::absent(stage, Stage::Three),
            data_quality_score: 0.0,
            calculation_version: crate::CALCULATION_VERSION.to_string(),
        }
    }

    /// Mark absent fields above the record's stage as gated
    pub fn regate(mut self) -> Self {
        let stage = self.stage;
        for (field, required) in [
            (&mut self.pcr_volume, Stage::One),
            (&mut self.pcr_open_interest, Stage::One),
            (&mut self.atm_iv, Stage::One),
            (&mut self.iv_skew, Stage::Two),
            (&mut self.iv_term_structure, Stage::Two),
            (&mut self.max_pain_strike, Stage::Two),
            (&mut self.avg_atm_call_delta, Stage::Three),
            (&mut self.avg_atm_put_delta, Stage::Three),
            (&mut self.gamma_exposure, Stage::Three),
            (&mut self.vanna_exposure, Stage::Three),
        ] {
            *field = field.regated(stage, required);
        }
        self.total_call_oi = self.total_call_oi.regated(stage, Stage::Two);
        self.total_put_oi = self.total_put_oi.regated(stage, Stage::Two);
        self
    }

    /// Upsert key
    pub fn key(&self) -> (String, NaiveDate) {
        (self.underlying.clone(), self.date)
    }

    /// True if any stage-2 field carries a value
    pub fn has_stage_two_values(&self) -> bool {
        self.iv_skew.is_value()
            || self.iv_term_structure.is_value()
            || self.max_pain_strike.is_value()
            || self.total_call_oi.is_value()
            || self.total_put_oi.is_value()
    }

    /// True if any stage-3 field carries a value
    pub fn has_stage_three_values(&self) -> bool {
        self.avg_atm_call_delta.is_value()
            || self.avg_atm_put_delta.is_value()
            || self.gamma_exposure.is_value()
            || self.vanna_exposure.is_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Three.permits(Stage::Two));
        assert!(Stage::Two.permits(Stage::Two));
        assert!(!Stage::One.permits(Stage::Two));
        assert_eq!(Stage::from_level(4), None);
    }

    #[test]
    fn test_empty_record_gating() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();

        let r = OptionDailyFactor::empty("TXO", date, Stage::One);
        assert_eq!(r.atm_iv, FactorValue::Unavailable);
        assert!(r.iv_skew.is_gated());
        assert!(r.gamma_exposure.is_gated());

        let r = OptionDailyFactor::empty("TXO", date, Stage::Two);
        assert_eq!(r.iv_skew, FactorValue::Unavailable);
        assert!(r.gamma_exposure.is_gated());
    }

    #[test]
    fn test_absent_serializes_as_null_not_zero() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let mut r = OptionDailyFactor::empty("TXO", date, Stage::One);
        r.pcr_volume = FactorValue::Value(0.0);

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["pcr_volume"], serde_json::json!(0.0));
        assert!(json["iv_skew"].is_null());
        assert!(json["atm_iv"].is_null());
        assert_eq!(json["stage"], serde_json::json!(1));

        let back: OptionDailyFactor = serde_json::from_value(json).unwrap();
        assert_eq!(back.pcr_volume, FactorValue::Value(0.0));
        assert!(back.iv_skew.value().is_none());
    }

    #[test]
    fn test_gating_survives_round_trip() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        for stage in [Stage::One, Stage::Two, Stage::Three] {
            let record = OptionDailyFactor::empty("TXO", date, stage);
            let json = serde_json::to_string(&record).unwrap();
            let back: OptionDailyFactor = serde_json::from_str(&json).unwrap();
            assert_eq!(back, record);
        }

        let mut record = OptionDailyFactor::empty("TXO", date, Stage::Two);
        record.total_call_oi = FactorValue::Value(2600);
        let back: OptionDailyFactor =
            serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();
        assert_eq!(back.total_call_oi, FactorValue::Value(2600));
        assert_eq!(back.total_put_oi, FactorValue::Unavailable);
        assert!(back.gamma_exposure.is_gated());
        assert_eq!(back.atm_iv, FactorValue::Unavailable);
    }
}
