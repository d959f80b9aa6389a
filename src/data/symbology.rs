//! Exchange option symbology
//!
//! Resolves an underlying id into its option class once, and parses
//! exchange contract codes as a fallback when broker metadata is incomplete.
//!
//! Code format: `[Prefix][Strike][Month][Year]`, e.g. `TXO18000C5`.
//! Month letters A-L are calls for January..December, M-X are puts.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::core::OptionRight;

/// Option classes the broker-backed source knows how to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionClass {
    /// Index options on the full-size index futures
    Txo,
    /// Mini index options
    Mxo,
}

impl OptionClass {
    /// Resolve an underlying id; `None` for unsupported underlyings
    pub fn resolve(underlying: &str) -> Option<Self> {
        match underlying.trim().to_ascii_uppercase().as_str() {
            "TXO" | "TX" | "TXF" => Some(OptionClass::Txo),
            "MXO" | "MTX" | "MXF" => Some(OptionClass::Mxo),
            _ => None,
        }
    }

    /// Catalogue category name
    pub fn code(&self) -> &'static str {
        match self {
            OptionClass::Txo => "TXO",
            OptionClass::Mxo => "MXO",
        }
    }

    /// Contract code prefixes, weeklies included
    pub fn prefixes(&self) -> &'static [&'static str] {
        match self {
            OptionClass::Txo => &["TXO", "TX1", "TX2", "TX4", "TX5"],
            OptionClass::Mxo => &["MXO"],
        }
    }

    /// Index points to currency
    pub fn multiplier(&self) -> f64 {
        match self {
            OptionClass::Txo => 50.0,
            OptionClass::Mxo => 10.0,
        }
    }

    /// Symbol of the underlying index in the price store
    pub fn spot_symbol(&self) -> &'static str {
        "TSE001"
    }
}

impl std::fmt::Display for OptionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Fields recovered from a contract code
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCode {
    pub prefix: String,
    pub strike: f64,
    pub right: OptionRight,
    pub month: u32,
    /// Last digit of the expiry year
    pub year_digit: u32,
}

impl ParsedCode {
    /// Monthly expiry (third Wednesday), resolving the year digit to the
    /// decade closest to `reference`
    pub fn monthly_expiry(&self, reference: NaiveDate) -> Option<NaiveDate> {
        let decade = reference.year() - reference.year().rem_euclid(10);
        let candidates = [decade - 10, decade, decade + 10]
            .map(|d| d + self.year_digit as i32);
        let year = candidates
            .into_iter()
            .min_by_key(|y| (y - reference.year()).abs())?;
        third_wednesday(year, self.month)
    }
}

/// Parse an exchange option code
pub fn parse_option_code(code: &str) -> Option<ParsedCode> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() < 6 || !code.is_ascii() {
        return None;
    }

    let prefix = [OptionClass::Txo, OptionClass::Mxo]
        .iter()
        .flat_map(|c| c.prefixes().iter())
        .find(|p| code.starts_with(**p))
        .map(|p| p.to_string())
        .or_else(|| {
            let end = code.find(|c: char| c.is_ascii_digit())?;
            Some(code[..end].to_string())
        })?;
    if prefix.is_empty() {
        return None;
    }

    let rest = &code[prefix.len()..];
    let mut chars = rest.chars().rev();
    let year_digit = chars.next()?.to_digit(10)?;
    let month_code = chars.next()?;

    let (right, month) = match month_code {
        'A'..='L' => (OptionRight::Call, month_code as u32 - 'A' as u32 + 1),
        'M'..='X' => (OptionRight::Put, month_code as u32 - 'M' as u32 + 1),
        _ => return None,
    };

    let strike: f64 = rest[..rest.len() - 2].parse().ok()?;
    if strike <= 0.0 {
        return None;
    }

    Some(ParsedCode {
        prefix,
        strike,
        right,
        month,
        year_digit,
    })
}

/// Third Wednesday of a month
pub fn third_wednesday(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;

    // Wednesday is day 2 counting from Monday
    let first_weekday = first.weekday().num_days_from_monday();
    let days_to_wednesday = (2 + 7 - first_weekday) % 7;
    let first_wednesday = first + Duration::days(days_to_wednesday as i64);

    Some(first_wednesday + Duration::days(14))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_class() {
        assert_eq!(OptionClass::resolve("txo"), Some(OptionClass::Txo));
        assert_eq!(OptionClass::resolve("MXO"), Some(OptionClass::Mxo));
        assert_eq!(OptionClass::resolve("TEO"), None);
        assert_eq!(OptionClass::Mxo.multiplier(), 10.0);
    }

    #[test]
    fn test_parse_call_code() {
        let p = parse_option_code("TXO18000C5").unwrap();
        assert_eq!(p.prefix, "TXO");
        assert_eq!(p.strike, 18000.0);
        assert_eq!(p.right, OptionRight::Call);
        assert_eq!(p.month, 3);
        assert_eq!(p.year_digit, 5);
    }

    #[test]
    fn test_parse_put_and_weekly_code() {
        let p = parse_option_code("TX117500O5").unwrap();
        assert_eq!(p.prefix, "TX1");
        assert_eq!(p.strike, 17500.0);
        assert_eq!(p.right, OptionRight::Put);
        assert_eq!(p.month, 3);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_option_code("TXFC5").is_none());
        assert!(parse_option_code("TXO18000Z5").is_none());
        assert!(parse_option_code("TXO1800AC5").is_none());
    }

    #[test]
    fn test_monthly_expiry() {
        // March 2025 third Wednesday is the 19th
        assert_eq!(
            third_wednesday(2025, 3),
            NaiveDate::from_ymd_opt(2025, 3, 19)
        );

        let p = parse_option_code("TXO18000A0").unwrap();
        let reference = NaiveDate::from_ymd_opt(2029, 12, 20).unwrap();
        assert_eq!(p.monthly_expiry(reference).unwrap().year(), 2030);
    }
}
