//! Daily factor calculation
//!
//! Aggregates one chain snapshot into the daily sentiment/risk record for an
//! underlying. Stage 1 gives PCR and ATM IV; stage 2 adds skew, term
//! structure, max pain and OI totals; stage 3 adds exposure factors.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::{FactorConfig, PipelineConfig, PricingConfig};
use crate::core::{
    year_fraction, ChainSnapshotRow, ContractFold, FactorValue, Greeks, OptionDailyFactor,
    OptionRight, Stage,
};
use crate::data::{OptionDataSource, PriceStore};
use crate::models::{greeks, implied_volatility_with};
use crate::stage::StageSnapshot;

const STRIKE_EPSILON: f64 = 1e-9;

/// Contract with a solved IV and Greeks
#[derive(Debug, Clone, PartialEq)]
pub struct PricedContract {
    pub code: String,
    pub right: OptionRight,
    pub strike: f64,
    pub iv: f64,
    pub greeks: Greeks,
    pub open_interest: u64,
    pub multiplier: f64,
}

/// Computes [`OptionDailyFactor`] records from a data source and a spot feed
pub struct FactorCalculator<'a, D: ?Sized, P: ?Sized> {
    source: &'a D,
    prices: &'a P,
    snapshot: StageSnapshot,
    pricing: PricingConfig,
    factors: FactorConfig,
}

impl<'a, D, P> FactorCalculator<'a, D, P>
where
    D: OptionDataSource + ?Sized,
    P: PriceStore + ?Sized,
{
    pub fn new(source: &'a D, prices: &'a P, snapshot: StageSnapshot) -> Self {
        Self {
            source,
            prices,
            snapshot,
            pricing: PricingConfig::default(),
            factors: FactorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.pricing = config.pricing.clone();
        self.factors = config.factors.clone();
        self
    }

    pub fn snapshot(&self) -> &StageSnapshot {
        &self.snapshot
    }

    /// Daily factors for one underlying on one trading date
    ///
    /// Never fails: missing inputs leave the affected fields absent.
    pub fn calculate_daily_factors(&self, underlying: &str, date: NaiveDate) -> OptionDailyFactor {
        let stage = self.snapshot.stage;
        let mut record = OptionDailyFactor::empty(underlying, date, stage);

        let rows = self.source.get_option_chain(underlying, date);
        if rows.is_empty() {
            tracing::warn!(
                "No option chain for {} on {} from {} source",
                underlying,
                date,
                self.source.name()
            );
            return record;
        }

        record.contract_count = rows.len();
        record.data_quality_score =
            rows.iter().filter(|r| r.has_valid_price()).count() as f64 / rows.len() as f64;

        let (calls, puts): (Vec<&ChainSnapshotRow>, Vec<&ChainSnapshotRow>) =
            rows.iter().partition(|r| r.right == OptionRight::Call);

        let call_volume: u64 = calls.iter().map(|r| r.volume).sum();
        let put_volume: u64 = puts.iter().map(|r| r.volume).sum();
        let call_oi: u64 = calls.iter().map(|r| r.open_interest).sum();
        let put_oi: u64 = puts.iter().map(|r| r.open_interest).sum();

        record.pcr_volume = ratio(put_volume, call_volume).into();
        record.pcr_open_interest = ratio(put_oi, call_oi).into();

        if stage.permits(Stage::Two) {
            record.total_call_oi = FactorValue::Value(call_oi);
            record.total_put_oi = FactorValue::Value(put_oi);
        }

        let expiries = live_expiries(&rows, date);
        let Some(&front) = expiries.first() else {
            tracing::warn!("{} chain on {} has no unexpired contracts", underlying, date);
            return record;
        };
        let front_rows: Vec<&ChainSnapshotRow> = rows.iter().filter(|r| r.expiry == front).collect();

        if stage.permits(Stage::Two) {
            record.max_pain_strike = max_pain(&front_rows).into();
        }

        record.spot = self.spot(underlying, &front_rows, front, date);
        let Some(spot) = record.spot else {
            tracing::warn!("No spot for {} on {}, IV factors unavailable", underlying, date);
            return record;
        };

        // Stage 3 exposures span the whole chain; earlier stages need two expiries at most
        let wanted = if stage.permits(Stage::Three) {
            expiries.len()
        } else {
            expiries.len().min(2)
        };
        let priced: BTreeMap<NaiveDate, ContractFold<PricedContract>> = expiries[..wanted]
            .iter()
            .map(|&expiry| (expiry, self.price_expiry(&rows, expiry, spot, date)))
            .collect();

        let front_priced = priced.get(&front).map(|f| f.ok.as_slice()).unwrap_or(&[]);
        let front_atm = atm_strike(&front_rows, spot);
        let front_atm_iv = front_atm.and_then(|k| atm_iv(front_priced, k));
        record.atm_iv = front_atm_iv.into();

        if stage.permits(Stage::Two) {
            let skew_delta = self.factors.skew_delta;
            let put_wing = iv_at_delta(front_priced, OptionRight::Put, -skew_delta);
            let call_wing = iv_at_delta(front_priced, OptionRight::Call, skew_delta);
            record.iv_skew = put_wing.zip(call_wing).map(|(p, c)| p - c).into();

            let next_atm_iv = expiries.get(1).and_then(|next| {
                let next_rows: Vec<&ChainSnapshotRow> =
                    rows.iter().filter(|r| r.expiry == *next).collect();
                let next_priced = priced.get(next).map(|f| f.ok.as_slice()).unwrap_or(&[]);
                atm_strike(&next_rows, spot).and_then(|k| atm_iv(next_priced, k))
            });
            record.iv_term_structure = next_atm_iv.zip(front_atm_iv).map(|(n, f)| n - f).into();
        }

        if stage.permits(Stage::Three) {
            if let Some(k) = front_atm {
                record.avg_atm_call_delta = atm_delta(front_priced, OptionRight::Call, k).into();
                record.avg_atm_put_delta = atm_delta(front_priced, OptionRight::Put, k).into();
            }

            let all_priced: Vec<&PricedContract> = priced.values().flat_map(|f| f.ok.iter()).collect();
            if !all_priced.is_empty() {
                record.gamma_exposure =
                    FactorValue::Value(exposure(&all_priced, |g| g.gamma));
                record.vanna_exposure =
                    FactorValue::Value(exposure(&all_priced, |g| g.vanna));
            }
        }

        tracing::info!(
            "{} {} factors: {} contracts, spot {:.2}, quality {:.2}, {}",
            underlying,
            date,
            record.contract_count,
            spot,
            record.data_quality_score,
            stage
        );
        record
    }

    /// Spot from the price feed, else implied from put-call parity
    fn spot(
        &self,
        underlying: &str,
        front_rows: &[&ChainSnapshotRow],
        front: NaiveDate,
        date: NaiveDate,
    ) -> Option<f64> {
        match self.prices.latest_price(underlying) {
            Ok(Some(record)) if record.close.is_finite() && record.close > 0.0 => {
                return Some(record.close)
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Spot lookup for {} failed: {}", underlying, e),
        }

        let estimate = parity_spot(
            front_rows,
            year_fraction(date, front),
            self.pricing.risk_free_rate,
        );
        if let Some(s) = estimate {
            tracing::info!("Spot for {} estimated from put-call parity: {:.2}", underlying, s);
        }
        estimate
    }

    fn price_expiry(
        &self,
        rows: &[ChainSnapshotRow],
        expiry: NaiveDate,
        spot: f64,
        date: NaiveDate,
    ) -> ContractFold<PricedContract> {
        let time = year_fraction(date, expiry);
        let fold = ContractFold::collect(
            rows.iter()
                .filter(|r| r.expiry == expiry)
                .map(|r| (r.contract_code.as_str(), self.price_row(r, spot, time))),
        );
        tracing::debug!(
            "Priced {}/{} contracts expiring {} ({:.0}% success)",
            fold.ok.len(),
            fold.total(),
            expiry,
            fold.success_rate() * 100.0
        );
        fold
    }

    fn price_row(
        &self,
        row: &ChainSnapshotRow,
        spot: f64,
        time: f64,
    ) -> Result<PricedContract, String> {
        let rate = self.pricing.risk_free_rate;
        let observed = row.best_price().ok_or("no usable price")?;
        let iv = implied_volatility_with(
            spot,
            row.strike,
            observed,
            time,
            row.right,
            rate,
            self.pricing.solver(),
        )
        .ok_or_else(|| format!("no implied vol for price {}", observed))?;
        let greeks = greeks(spot, row.strike, time, iv, row.right, rate)
            .ok_or("Greeks not computable")?;

        Ok(PricedContract {
            code: row.contract_code.clone(),
            right: row.right,
            strike: row.strike,
            iv,
            greeks,
            open_interest: row.open_interest,
            multiplier: row.multiplier,
        })
    }
}

fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

fn same_strike(a: f64, b: f64) -> bool {
    (a - b).abs() < STRIKE_EPSILON
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Expiries with time left on `date`, ascending
fn live_expiries(rows: &[ChainSnapshotRow], date: NaiveDate) -> Vec<NaiveDate> {
    let mut expiries: Vec<NaiveDate> = rows
        .iter()
        .map(|r| r.expiry)
        .filter(|e| *e > date)
        .collect();
    expiries.sort();
    expiries.dedup();
    expiries
}

/// Strike closest to spot
pub(crate) fn atm_strike(rows: &[&ChainSnapshotRow], spot: f64) -> Option<f64> {
    rows.iter()
        .map(|r| r.strike)
        .filter(|k| k.is_finite())
        .min_by(|a, b| (a - spot).abs().total_cmp(&(b - spot).abs()))
}

/// Average of call and put IV at the ATM strike, or whichever side resolved
pub(crate) fn atm_iv(priced: &[PricedContract], strike: f64) -> Option<f64> {
    let side = |right: OptionRight| {
        mean(
            priced
                .iter()
                .filter(|c| c.right == right && same_strike(c.strike, strike))
                .map(|c| c.iv),
        )
    };
    match (side(OptionRight::Call), side(OptionRight::Put)) {
        (Some(c), Some(p)) => Some((c + p) / 2.0),
        (c, p) => c.or(p),
    }
}

fn atm_delta(priced: &[PricedContract], right: OptionRight, strike: f64) -> Option<f64> {
    mean(
        priced
            .iter()
            .filter(|c| c.right == right && same_strike(c.strike, strike))
            .map(|c| c.greeks.delta),
    )
}

/// IV at a target delta, linear in delta between neighbouring contracts
///
/// No extrapolation past the outermost quoted deltas.
pub(crate) fn iv_at_delta(priced: &[PricedContract], right: OptionRight, target: f64) -> Option<f64> {
    let mut points: Vec<(f64, f64)> = priced
        .iter()
        .filter(|c| c.right == right)
        .map(|c| (c.greeks.delta, c.iv))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    interpolate(&points, target)
}

pub(crate) fn interpolate(points: &[(f64, f64)], x: f64) -> Option<f64> {
    if let [(x0, y0)] = points {
        return ((x0 - x).abs() < STRIKE_EPSILON).then_some(*y0);
    }
    points
        .windows(2)
        .find(|w| w[0].0 <= x && x <= w[1].0)
        .map(|w| {
            let (x0, y0) = w[0];
            let (x1, y1) = w[1];
            if (x1 - x0).abs() < STRIKE_EPSILON {
                y0
            } else {
                y0 + (y1 - y0) * (x - x0) / (x1 - x0)
            }
        })
}

/// Strike at which option writers pay out least at expiry
///
/// Ties go to the lowest strike. Absent when the expiry carries no open
/// interest.
pub(crate) fn max_pain(rows: &[&ChainSnapshotRow]) -> Option<f64> {
    if rows.iter().all(|r| r.open_interest == 0) {
        return None;
    }

    let mut strikes: Vec<f64> = rows.iter().map(|r| r.strike).collect();
    strikes.sort_by(f64::total_cmp);
    strikes.dedup_by(|a, b| same_strike(*a, *b));

    let payout = |settle: f64| -> f64 {
        rows.iter()
            .map(|r| r.open_interest as f64 * r.right.intrinsic(settle, r.strike))
            .sum()
    };

    strikes
        .into_iter()
        .map(|k| (k, payout(k)))
        .fold(None, |best: Option<(f64, f64)>, (k, p)| match best {
            Some((_, best_p)) if best_p <= p => best,
            _ => Some((k, p)),
        })
        .map(|(k, _)| k)
}

fn exposure(priced: &[&PricedContract], greek: impl Fn(&Greeks) -> f64) -> f64 {
    priced
        .iter()
        .map(|c| greek(&c.greeks.scale(c.open_interest as f64 * c.multiplier)))
        .sum()
}

/// Spot implied by the call/put pair with the smallest price gap
///
/// `S = C - P + K e^{-rT}`
pub(crate) fn parity_spot(rows: &[&ChainSnapshotRow], time: f64, rate: f64) -> Option<f64> {
    if time <= 0.0 {
        return None;
    }
    let discount = (-rate * time).exp();

    rows.iter()
        .filter(|r| r.right == OptionRight::Call)
        .filter_map(|call| {
            let c = call.best_price()?;
            let p = rows
                .iter()
                .find(|r| r.right == OptionRight::Put && same_strike(r.strike, call.strike))?
                .best_price()?;
            Some(((c - p).abs(), c - p + call.strike * discount))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, spot)| spot)
        .filter(|s| s.is_finite() && *s > 0.0)
}
