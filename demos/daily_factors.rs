//! Example: Daily factors from a synthetic TXO chain
//!
//! Run with: cargo run --example daily_factors

use chrono::{NaiveDate, Utc};
use option_factors::core::year_fraction;
use option_factors::prelude::*;

fn main() {
    let spot = 18000.0;
    let rate = 0.015;
    let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let expiries = [
        NaiveDate::from_ymd_opt(2025, 3, 19).unwrap(),
        NaiveDate::from_ymd_opt(2025, 4, 16).unwrap(),
    ];

    // Downward sloping smile, slightly higher vol in the back month
    let vol = |strike: f64, back: bool| {
        let base = if back { 0.21 } else { 0.19 };
        base - 0.4 * (strike / spot).ln()
    };

    let mut rows = Vec::new();
    for (i, expiry) in expiries.iter().enumerate() {
        let time = year_fraction(date, *expiry);
        for k in 0..17 {
            let strike = 17000.0 + 125.0 * k as f64;
            for right in [OptionRight::Call, OptionRight::Put] {
                let price = bs_price(spot, strike, time, vol(strike, i == 1), right, rate);
                let otm = right.intrinsic(spot, strike) == 0.0;
                rows.push(ChainSnapshotRow {
                    contract_code: format!("TXO{:.0}{:?}{}", strike, right, i),
                    right,
                    strike,
                    expiry: *expiry,
                    last: Some((price * 10.0).round() / 10.0),
                    bid: None,
                    ask: None,
                    volume: if otm { 400 } else { 120 },
                    open_interest: if right == OptionRight::Put { 900 } else { 700 },
                    multiplier: 50.0,
                });
            }
        }
    }

    println!("=== Synthetic TXO chain ===\n");
    println!("Spot:      {:.0}", spot);
    println!("Contracts: {}", rows.len());
    println!("Expiries:  {} / {}\n", expiries[0], expiries[1]);

    let source = StaticOptionSource::new(rows);
    let prices = InMemoryPriceStore::new();
    prices
        .put(PriceRecord::new("TXO", Utc::now(), spot))
        .expect("in-memory store");

    for stage in [Stage::One, Stage::Two, Stage::Three] {
        let record = FactorCalculator::new(&source, &prices, StageSnapshot::at_stage(stage))
            .calculate_daily_factors("TXO", date);

        println!("--- {} ---", stage);
        println!("  PCR (volume):  {}", show(record.pcr_volume));
        println!("  PCR (OI):      {}", show(record.pcr_open_interest));
        println!("  ATM IV:        {}", show(record.atm_iv));
        println!("  IV skew:       {}", show(record.iv_skew));
        println!("  Term struct:   {}", show(record.iv_term_structure));
        println!("  Max pain:      {}", show(record.max_pain_strike));
        println!("  Gamma exp.:    {}", show(record.gamma_exposure));
        println!("  Vanna exp.:    {}", show(record.vanna_exposure));
        println!("  Quality:       {:.2}\n", record.data_quality_score);
    }
}

fn show(value: FactorValue<f64>) -> String {
    match value {
        FactorValue::Value(v) => format!("{:.4}", v),
        FactorValue::Unavailable => "unavailable".to_string(),
        FactorValue::Gated => "(stage disabled)".to_string(),
    }
}
