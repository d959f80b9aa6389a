//! File-backed factor store
//!
//! One JSON document per (underlying, date). Writing the same key again
//! replaces the file, which gives upsert semantics.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::store::FactorRepository;
use crate::core::{OptionDailyFactor, OptionsError, OptionsResult};

/// JSON factor store rooted at a directory
pub struct JsonFactorStore {
    dir: PathBuf,
}

impl JsonFactorStore {
    pub fn new(dir: impl AsRef<Path>) -> OptionsResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    fn path_for(&self, underlying: &str, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", underlying, date.format("%Y-%m-%d")))
    }

    /// Stored dates for an underlying, ascending
    pub fn dates(&self, underlying: &str) -> OptionsResult<Vec<NaiveDate>> {
        let prefix = format!("{}_", underlying);
        let mut dates = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();

            let Some(stem) = file_name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };
            if let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                dates.push(date);
            }
        }

        dates.sort();
        Ok(dates)
    }

    /// Remove every stored record for an underlying
    pub fn clear(&self, underlying: &str) -> OptionsResult<usize> {
        let mut removed = 0;
        for date in self.dates(underlying)? {
            fs::remove_file(self.path_for(underlying, date))?;
            removed += 1;
        }
        Ok(removed)
    }
}

impl FactorRepository for JsonFactorStore {
    fn upsert(&self, record: &OptionDailyFactor) -> OptionsResult<()> {
        let path = self.path_for(&record.underlying, record.date);
        let json = serde_json::to_string_pretty(record)?;

        // Write beside the target then rename, so readers never see half a file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!("Stored factors for {} {} at {:?}", record.underlying, record.date, path);
        Ok(())
    }

    fn get(&self, underlying: &str, date: NaiveDate) -> OptionsResult<Option<OptionDailyFactor>> {
        let path = self.path_for(underlying, date);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)?;
        let record = serde_json::from_str(&json).map_err(|e| {
            OptionsError::Serialization(format!("{}: {}", path.display(), e))
        })?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FactorValue, Stage};
    use tempfile::tempdir;

    #[test]
    fn test_factor_store_operations() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFactorStore::new(temp_dir.path().join("factors")).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();

        assert!(store.get("TXO", date).unwrap().is_none());

        let mut record = OptionDailyFactor::empty("TXO", date, Stage::One);
        record.pcr_volume = FactorValue::Value(0.8);
        store.upsert(&record).unwrap();

        record.pcr_volume = FactorValue::Value(1.1);
        store.upsert(&record).unwrap();

        let loaded = store.get("TXO", date).unwrap().unwrap();
        assert_eq!(loaded.pcr_volume.get(), Some(1.1));
        assert!(loaded.iv_skew.is_gated());
        assert_eq!(store.dates("TXO").unwrap(), vec![date]);

        assert_eq!(store.clear("TXO").unwrap(), 1);
        assert!(store.dates("TXO").unwrap().is_empty());
    }

    #[test]
    fn test_stored_record_keeps_gating() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFactorStore::new(temp_dir.path()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();

        let record = OptionDailyFactor::empty("TXO", date, Stage::One);
        store.upsert(&record).unwrap();

        let loaded = store.get("TXO", date).unwrap().unwrap();
        assert_eq!(loaded.atm_iv, FactorValue::Unavailable);
        assert!(loaded.max_pain_strike.is_gated());
        assert!(loaded.vanna_exposure.is_gated());
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFactorStore::new(temp_dir.path()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        fs::write(store.path_for("TXO", date), "{not json").unwrap();

        assert!(store.get("TXO", date).is_err());
    }
}
