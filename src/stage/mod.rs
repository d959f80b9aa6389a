//! Stage Gate
//!
//! Feature rollout flags read from a key-value configuration store:
//! - `option_stage`: 1, 2 or 3
//! - `option_enabled_underlyings`: comma separated underlying ids
//! - `option_minute_sync_enabled`: minute bar sync on/off
//! - `option_greeks_enabled`: Greeks job on/off
//!
//! Calculations take a [`StageSnapshot`] fetched once per run, so a run is
//! reproducible from its snapshot.

mod store;

pub use store::*;

pub use crate::core::Stage;

use serde::{Deserialize, Serialize};

pub const KEY_STAGE: &str = "option_stage";
pub const KEY_ENABLED_UNDERLYINGS: &str = "option_enabled_underlyings";
pub const KEY_MINUTE_SYNC: &str = "option_minute_sync_enabled";
pub const KEY_GREEKS: &str = "option_greeks_enabled";

const DEFAULT_UNDERLYINGS: &[&str] = &["TXO"];

/// Immutable view of the stage configuration for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub stage: Stage,
    pub enabled_underlyings: Vec<String>,
    pub minute_sync_enabled: bool,
    pub greeks_enabled: bool,
}

impl Default for StageSnapshot {
    fn default() -> Self {
        Self {
            stage: Stage::One,
            enabled_underlyings: DEFAULT_UNDERLYINGS.iter().map(|s| s.to_string()).collect(),
            minute_sync_enabled: false,
            greeks_enabled: false,
        }
    }
}

impl StageSnapshot {
    pub fn at_stage(stage: Stage) -> Self {
        Self {
            stage,
            ..Default::default()
        }
    }

    pub fn permits(&self, required: Stage) -> bool {
        self.stage.permits(required)
    }

    pub fn is_enabled(&self, underlying: &str) -> bool {
        self.enabled_underlyings
            .iter()
            .any(|u| u.eq_ignore_ascii_case(underlying))
    }
}

/// Read-only lookup into the stage configuration
pub struct StageGate<S: ConfigStore> {
    store: S,
}

impl<S: ConfigStore> StageGate<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn lookup(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!("Config lookup for {} failed, using default: {}", key, e);
                None
            }
        }
    }

    fn flag(&self, key: &str) -> bool {
        match self.lookup(key).map(|v| v.to_ascii_lowercase()) {
            None => false,
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    tracing::warn!("Invalid boolean {:?} for {}, treating as false", other, key);
                    false
                }
            },
        }
    }

    /// Current rollout stage (defaults to stage 1)
    pub fn current_stage(&self) -> Stage {
        let Some(raw) = self.lookup(KEY_STAGE) else {
            return Stage::One;
        };
        match raw.parse::<u8>().ok().and_then(Stage::from_level) {
            Some(stage) => stage,
            None => {
                tracing::warn!("Invalid {} value {:?}, falling back to stage 1", KEY_STAGE, raw);
                Stage::One
            }
        }
    }

    pub fn enabled_underlyings(&self) -> Vec<String> {
        match self.lookup(KEY_ENABLED_UNDERLYINGS) {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_UNDERLYINGS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_minute_sync_enabled(&self) -> bool {
        self.flag(KEY_MINUTE_SYNC)
    }

    pub fn is_greeks_enabled(&self) -> bool {
        self.flag(KEY_GREEKS)
    }

    /// Fetch every flag once
    pub fn snapshot(&self) -> StageSnapshot {
        let snapshot = StageSnapshot {
            stage: self.current_stage(),
            enabled_underlyings: self.enabled_underlyings(),
            minute_sync_enabled: self.is_minute_sync_enabled(),
            greeks_enabled: self.is_greeks_enabled(),
        };
        tracing::debug!(?snapshot, "Stage configuration loaded");
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let gate = StageGate::new(InMemoryConfigStore::new());
        let snap = gate.snapshot();
        assert_eq!(snap, StageSnapshot::default());
        assert_eq!(snap.enabled_underlyings, vec!["TXO".to_string()]);
    }

    #[test]
    fn test_reads_flags() {
        let store = InMemoryConfigStore::new()
            .with(KEY_STAGE, "3")
            .with(KEY_ENABLED_UNDERLYINGS, "txo, MXO,,")
            .with(KEY_MINUTE_SYNC, "true")
            .with(KEY_GREEKS, "1");
        let gate = StageGate::new(store);

        assert_eq!(gate.current_stage(), Stage::Three);
        assert_eq!(gate.enabled_underlyings(), vec!["TXO", "MXO"]);
        assert!(gate.is_minute_sync_enabled());
        assert!(gate.is_greeks_enabled());
        assert!(gate.snapshot().is_enabled("mxo"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let store = InMemoryConfigStore::new()
            .with(KEY_STAGE, "7")
            .with(KEY_GREEKS, "maybe");
        let gate = StageGate::new(store);

        assert_eq!(gate.current_stage(), Stage::One);
        assert!(!gate.is_greeks_enabled());
    }

    #[test]
    fn test_reads_latest_value() {
        let gate = StageGate::new(InMemoryConfigStore::new().with(KEY_STAGE, "1"));
        assert_eq!(gate.current_stage(), Stage::One);

        gate.store().set(KEY_STAGE, "2").unwrap();
        assert_eq!(gate.current_stage(), Stage::Two);
    }
}
