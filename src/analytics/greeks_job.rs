//! Per-contract Greeks
//!
//! Inverts the observed price into an implied volatility, then evaluates
//! Black-Scholes Greeks at that volatility. Rows keep the inputs used so a
//! stored value can be reproduced.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;

use crate::config::PricingConfig;
use crate::core::{
    time_to_settlement, OptionChainResponse, OptionContract, OptionGreeks, OptionRight,
    PriceRecord,
};
use crate::models::{greeks, implied_volatility_with};
use crate::stage::StageSnapshot;

/// Greeks from price records
#[derive(Debug, Clone, Default)]
pub struct GreeksCalculator {
    pricing: PricingConfig,
}

impl GreeksCalculator {
    pub fn new(pricing: PricingConfig) -> Self {
        Self { pricing }
    }

    /// Greeks row for one contract at `as_of`
    ///
    /// Every Greek is absent when the contract is not active, has expired,
    /// the price or spot is missing or unusable, or the IV does not resolve.
    pub fn compute(
        &self,
        contract: &OptionContract,
        price: &PriceRecord,
        spot: Option<f64>,
        as_of: DateTime<Utc>,
    ) -> OptionGreeks {
        let rate = self.pricing.risk_free_rate;
        let mut row = OptionGreeks::absent(&contract.code, as_of, rate);

        row.spot = spot.filter(|s| s.is_finite() && *s > 0.0);
        let time = contract.time_to_expiry_at(as_of);
        if time > 0.0 {
            row.time_to_expiry = Some(time);
        }

        if !contract.is_active() {
            tracing::debug!("{} is {:?}, no Greeks", contract.code, contract.state);
            return row;
        }
        let (Some(spot), Some(time)) = (row.spot, row.time_to_expiry) else {
            tracing::debug!("{}: no spot or already settled", contract.code);
            return row;
        };

        match self.evaluate(spot, contract.strike_f64(), price.close, time, contract.right) {
            Some((iv, g)) => {
                row.volatility = Some(iv);
                row.with_greeks(&g)
            }
            None => {
                tracing::debug!("{}: no IV for close {}", contract.code, price.close);
                row
            }
        }
    }

    /// Fill Greeks and IV on chain items
    ///
    /// Does nothing unless the Greeks flag is on and the chain has a spot.
    /// Returns the number of items enriched.
    pub fn enrich_chain(
        &self,
        chain: &mut OptionChainResponse,
        snapshot: &StageSnapshot,
        as_of: DateTime<Utc>,
    ) -> usize {
        if !snapshot.greeks_enabled {
            return 0;
        }
        let Some(spot) = chain.spot else {
            tracing::debug!("{} chain has no spot, Greeks skipped", chain.underlying);
            return 0;
        };
        let time = time_to_settlement(chain.expiry, as_of);
        if time <= 0.0 {
            return 0;
        }

        let mut enriched = 0;
        let sides = [
            (OptionRight::Call, &mut chain.calls),
            (OptionRight::Put, &mut chain.puts),
        ];
        for (right, items) in sides {
            for item in items.iter_mut() {
                let Some(observed) = item.price else { continue };
                let Some(strike) = item.strike.to_f64() else { continue };
                if let Some((iv, g)) = self.evaluate(spot, strike, observed, time, right) {
                    item.implied_vol = Some(iv);
                    item.greeks = Some(g);
                    enriched += 1;
                }
            }
        }

        tracing::debug!(
            "Enriched {}/{} {} contracts with Greeks",
            enriched,
            chain.len(),
            chain.underlying
        );
        enriched
    }

    fn evaluate(
        &self,
        spot: f64,
        strike: f64,
        observed: f64,
        time: f64,
        right: OptionRight,
    ) -> Option<(f64, crate::core::Greeks)> {
        let rate = self.pricing.risk_free_rate;
        let iv = implied_volatility_with(
            spot,
            strike,
            observed,
            time,
            right,
            rate,
            self.pricing.solver(),
        )?;
        greeks(spot, strike, time, iv, right, rate).map(|g| (iv, g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChainItem, ContractState, Stage};
    use crate::models::price;
    use chrono::{Duration, NaiveDate};
    use rust_decimal_macros::dec;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 19).unwrap()
    }

    fn contract() -> OptionContract {
        OptionContract::new("TXO18000C5", "TXO", OptionRight::Call, dec!(18000), expiry(), dec!(50))
    }

    fn as_of() -> DateTime<Utc> {
        contract().expiry_at() - Duration::days(30)
    }

    #[test]
    fn test_compute_recovers_inputs() {
        let calc = GreeksCalculator::default();
        let time = 30.0 / 365.0;
        let close = price(18000.0, 18000.0, time, 0.2, OptionRight::Call, 0.015);
        let record = PriceRecord::new("TXO18000C5", as_of(), close);

        let row = calc.compute(&contract(), &record, Some(18000.0), as_of());

        assert!(row.has_greeks());
        assert_eq!(row.timestamp, as_of());
        assert!((row.volatility.unwrap() - 0.2).abs() < 1e-4);
        assert!((row.time_to_expiry.unwrap() - time).abs() < 1e-9);
        assert!((row.delta.unwrap() - 0.5).abs() < 0.05);
        assert!(row.charm.is_some());
        assert_eq!(row.risk_free_rate, 0.015);
    }

    #[test]
    fn test_compute_absent_on_bad_inputs() {
        let calc = GreeksCalculator::default();
        let record = PriceRecord::new("TXO18000C5", as_of(), 0.0);
        assert!(!calc.compute(&contract(), &record, Some(18000.0), as_of()).has_greeks());

        let record = PriceRecord::new("TXO18000C5", as_of(), 250.0);
        assert!(!calc.compute(&contract(), &record, Some(-1.0), as_of()).has_greeks());

        let row = calc.compute(&contract(), &record, None, as_of());
        assert!(!row.has_greeks());
        assert!(row.spot.is_none());
        assert!(row.time_to_expiry.is_some());

        let settled = contract().expiry_at() + Duration::hours(1);
        let row = calc.compute(&contract(), &record, Some(18000.0), settled);
        assert!(!row.has_greeks());
        assert!(row.time_to_expiry.is_none());

        let mut expired = contract();
        expired.state = ContractState::Expired;
        assert!(!calc.compute(&expired, &record, Some(18000.0), as_of()).has_greeks());
    }

    #[test]
    fn test_enrich_chain_respects_flag() {
        let time = 30.0 / 365.0;
        let mut call = ChainItem::new("TXO18000C5", dec!(18000));
        call.price = Some(price(18000.0, 18000.0, time, 0.2, OptionRight::Call, 0.015));
        let mut put = ChainItem::new("TXO18000O5", dec!(18000));
        put.price = Some(price(18000.0, 18000.0, time, 0.2, OptionRight::Put, 0.015));
        let unpriced = ChainItem::new("TXO18200O5", dec!(18200));

        let mut chain = OptionChainResponse {
            underlying: "TXO".into(),
            expiry: expiry(),
            spot: Some(18000.0),
            calls: vec![call],
            puts: vec![put, unpriced],
        };
        let calc = GreeksCalculator::default();

        let disabled = StageSnapshot::at_stage(Stage::One);
        assert_eq!(calc.enrich_chain(&mut chain, &disabled, as_of()), 0);
        assert!(chain.calls[0].greeks.is_none());

        let enabled = StageSnapshot {
            greeks_enabled: true,
            ..StageSnapshot::default()
        };
        assert_eq!(calc.enrich_chain(&mut chain, &enabled, as_of()), 2);

        let call_delta = chain.calls[0].greeks.unwrap().delta;
        let put_delta = chain.puts[0].greeks.unwrap().delta;
        assert!((call_delta - put_delta - 1.0).abs() < 1e-4);
        assert!(chain.puts[1].greeks.is_none());
    }
}
