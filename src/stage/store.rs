//! Key-value configuration stores backing the stage gate

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::{OptionsError, OptionsResult};

/// Read-only view of a small keyed configuration table
pub trait ConfigStore: Send + Sync {
    /// Latest committed value for `key`
    fn get(&self, key: &str) -> OptionsResult<Option<String>>;
}

impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    fn get(&self, key: &str) -> OptionsResult<Option<String>> {
        (**self).get(key)
    }
}

/// In-process store, mainly for tests and embedded use
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn set(&self, key: &str, value: impl Into<String>) -> OptionsResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| OptionsError::config("config store lock poisoned"))?;
        values.insert(key.to_string(), value.into());
        Ok(())
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn get(&self, key: &str) -> OptionsResult<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|_| OptionsError::config("config store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }
}

/// Flat JSON object on disk, re-read on every lookup
///
/// Values may be strings, numbers or booleans; they are handed out as strings.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> OptionsResult<serde_json::Map<String, serde_json::Value>> {
        if !self.path.exists() {
            return Ok(serde_json::Map::new());
        }
        let json = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&json)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(OptionsError::config(format!(
                "{:?} is not a JSON object",
                self.path
            ))),
        }
    }
}

impl ConfigStore for JsonConfigStore {
    fn get(&self, key: &str) -> OptionsResult<Option<String>> {
        let map = self.load()?;
        Ok(map.get(key).and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }))
    }
}
