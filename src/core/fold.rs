//! Per-contract failure tolerance
//!
//! Chains are processed contract by contract; one bad contract must never
//! abort the whole run. Results are folded into successes plus a failure
//! count that feeds logging and data quality.

use std::fmt::Display;

/// Successes and failure count from a per-contract pass
#[derive(Debug, Clone, PartialEq)]
pub struct ContractFold<T> {
    pub ok: Vec<T>,
    pub failed: usize,
}

impl<T> Default for ContractFold<T> {
    fn default() -> Self {
        Self {
            ok: Vec::new(),
            failed: 0,
        }
    }
}

impl<T> ContractFold<T> {
    /// Fold `(contract code, result)` pairs, logging each failure
    pub fn collect<C, E, I>(results: I) -> Self
    where
        C: AsRef<str>,
        E: Display,
        I: IntoIterator<Item = (C, Result<T, E>)>,
    {
        results
            .into_iter()
            .fold(Self::default(), |acc, (code, result)| acc.push(code.as_ref(), result))
    }

    pub fn push<E: Display>(mut self, code: &str, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => self.ok.push(value),
            Err(e) => {
                tracing::debug!("Skipping contract {}: {}", code, e);
                self.failed += 1;
            }
        }
        self
    }

    pub fn total(&self) -> usize {
        self.ok.len() + self.failed
    }

    /// Fraction of contracts that succeeded; 0 for an empty pass
    pub fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.ok.len() as f64 / n as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_counts_failures() {
        let results: Vec<(&str, Result<u32, String>)> = vec![
            ("A", Ok(1)),
            ("B", Err("no quote".to_string())),
            ("C", Ok(3)),
            ("D", Err("bad strike".to_string())),
        ];
        let fold = ContractFold::collect(results);
        assert_eq!(fold.ok, vec![1, 3]);
        assert_eq!(fold.failed, 2);
        assert!((fold.success_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_fold() {
        let fold: ContractFold<u32> = ContractFold::collect(Vec::<(&str, Result<u32, String>)>::new());
        assert_eq!(fold.total(), 0);
        assert_eq!(fold.success_rate(), 0.0);
    }
}
