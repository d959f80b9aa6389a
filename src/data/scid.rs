//! Sierra Chart intraday file reader
//!
//! Serves latest prices straight from `.scid` files written by a charting
//! feed, one file per symbol.
//!
//! Layout: a 56-byte header followed by 40-byte records
//! `{ i64 µs since 1899-12-30, f32 open, high, low, close, u32 trades,
//! volume, bid volume, ask volume }`, little endian.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::store::PriceStore;
use crate::core::{OptionsError, OptionsResult, PriceRecord};

const HEADER_SIZE: u64 = 56;
const RECORD_SIZE: u64 = 40;

/// Latest-price store over a directory of `.scid` files
#[derive(Debug, Clone)]
pub struct ScidPriceStore {
    data_dir: PathBuf,
    /// Symbol -> file stem, for symbols whose feed name differs
    aliases: HashMap<String, String>,
}

impl ScidPriceStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            aliases: HashMap::new(),
        }
    }

    /// Map a pipeline symbol to the feed's file name, e.g. `TSE001` -> `TWSE`
    pub fn with_alias(mut self, symbol: impl Into<String>, file_stem: impl Into<String>) -> Self {
        self.aliases.insert(symbol.into(), file_stem.into());
        self
    }

    fn file_for(&self, symbol: &str) -> PathBuf {
        let stem = self.aliases.get(symbol).map(String::as_str).unwrap_or(symbol);
        self.data_dir.join(format!("{}.scid", stem))
    }

    /// Read the last record of one file
    pub fn read_last(&self, symbol: &str) -> OptionsResult<Option<PriceRecord>> {
        let file_path = self.file_for(symbol);
        if !file_path.exists() {
            return Ok(None);
        }
        read_last_record(&file_path).map(|rec| rec.map(|r| r.into_price_record(symbol)))
    }
}

impl PriceStore for ScidPriceStore {
    fn latest_prices(&self, symbols: &[String]) -> OptionsResult<HashMap<String, PriceRecord>> {
        if !self.data_dir.exists() {
            return Err(OptionsError::data(format!(
                "Data directory does not exist: {}",
                self.data_dir.display()
            )));
        }

        let mut prices = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            match self.read_last(symbol) {
                Ok(Some(record)) => {
                    prices.insert(symbol.clone(), record);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping {}: {}", symbol, e),
            }
        }
        Ok(prices)
    }
}

#[derive(Debug, Clone, Copy)]
struct ScidRecord {
    ts: DateTime<Utc>,
    close: f32,
    volume: u32,
}

impl ScidRecord {
    fn into_price_record(self, symbol: &str) -> PriceRecord {
        let mut record = PriceRecord::new(symbol, self.ts, self.close as f64);
        record.volume = Some(self.volume as u64);
        record
    }
}

fn scid_epoch() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

fn read_last_record(path: &Path) -> OptionsResult<Option<ScidRecord>> {
    let mut file = File::open(path)?;
    let file_size = file.metadata()?.len();

    if file_size < HEADER_SIZE + RECORD_SIZE {
        return Ok(None);
    }

    let num_records = (file_size - HEADER_SIZE) / RECORD_SIZE;
    file.seek(SeekFrom::Start(HEADER_SIZE + (num_records - 1) * RECORD_SIZE))?;

    let mut buffer = [0u8; RECORD_SIZE as usize];
    file.read_exact(&mut buffer)?;

    let micros = i64::from_le_bytes(bytes_at(&buffer, 0));
    let close = f32::from_le_bytes(bytes_at(&buffer, 20));
    let volume = u32::from_le_bytes(bytes_at(&buffer, 28));

    if !close.is_finite() || close <= 0.0 {
        return Err(OptionsError::data(format!(
            "{}: last record has no usable close",
            path.display()
        )));
    }

    let ts = scid_epoch()
        .checked_add_signed(Duration::microseconds(micros))
        .ok_or_else(|| {
            OptionsError::data(format!(
                "{}: last record timestamp {} out of range",
                path.display(),
                micros
            ))
        })?;

    Ok(Some(ScidRecord { ts, close, volume }))
}

fn bytes_at<const N: usize>(buffer: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buffer[offset..offset + N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(ts: DateTime<Utc>, close: f32, volume: u32) -> Vec<u8> {
        let micros = (ts - scid_epoch()).num_microseconds().unwrap();
        let mut out = Vec::with_capacity(RECORD_SIZE as usize);
        out.extend_from_slice(&micros.to_le_bytes());
        for v in [close, close, close, close] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in [1u32, volume, 0, 0] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    fn write_scid(dir: &Path, stem: &str, records: &[Vec<u8>]) {
        let mut bytes = vec![0u8; HEADER_SIZE as usize];
        for r in records {
            bytes.extend_from_slice(r);
        }
        std::fs::write(dir.join(format!("{}.scid", stem)), bytes).unwrap();
    }

    #[test]
    fn test_reads_last_record() {
        let dir = tempdir().unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 3, 3, 1, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 3, 3, 1, 1, 0).unwrap();
        write_scid(dir.path(), "TWSE", &[record(t0, 22000.0, 3), record(t1, 22010.5, 7)]);

        let store = ScidPriceStore::new(dir.path()).with_alias("TSE001", "TWSE");
        let prices = store
            .latest_prices(&["TSE001".to_string(), "MISSING".to_string()])
            .unwrap();

        assert_eq!(prices.len(), 1);
        let rec = &prices["TSE001"];
        assert_eq!(rec.symbol, "TSE001");
        assert_eq!(rec.timestamp, t1);
        assert!((rec.close - 22010.5).abs() < 1e-6);
        assert_eq!(rec.volume, Some(7));
    }

    #[test]
    fn test_corrupt_timestamp_skips_symbol() {
        let dir = tempdir().unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 3, 3, 1, 0, 0).unwrap();
        let mut corrupt = record(t0, 22000.0, 3);
        corrupt[..8].copy_from_slice(&i64::MAX.to_le_bytes());
        write_scid(dir.path(), "BAD", &[corrupt]);
        write_scid(dir.path(), "GOOD", &[record(t0, 21990.0, 1)]);

        let store = ScidPriceStore::new(dir.path());
        assert!(store.read_last("BAD").is_err());

        let prices = store
            .latest_prices(&["BAD".to_string(), "GOOD".to_string()])
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert!(prices.contains_key("GOOD"));
    }

    #[test]
    fn test_header_only_file_has_no_price() {
        let dir = tempdir().unwrap();
        write_scid(dir.path(), "EMPTY", &[]);

        let store = ScidPriceStore::new(dir.path());
        assert!(store.read_last("EMPTY").unwrap().is_none());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let store = ScidPriceStore::new("/nonexistent/scid");
        assert!(store.latest_prices(&["X".to_string()]).is_err());
    }
}
