//! Black-Scholes Model
//!
//! Provides:
//! - European option pricing
//! - Greeks computation (theta/charm per day, vega/rho per 1%)
//! - Implied volatility solver (Newton-Raphson)
//!
//! Every function here is pure. Invalid inputs produce `None`, never a panic
//! and never `NaN`.

use std::f64::consts::{PI, SQRT_2};

use statrs::function::erf::erfc;

use crate::core::{Greeks, OptionRight};

/// Plausible range for a solved implied volatility
pub const IV_FLOOR: f64 = 0.01;
pub const IV_CEILING: f64 = 2.0;

const MIN_VEGA: f64 = 1e-10;

/// Standard normal CDF
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal PDF
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Black-Scholes d1 parameter
pub fn d1(spot: f64, strike: f64, time: f64, vol: f64, rate: f64) -> f64 {
    ((spot / strike).ln() + (rate + 0.5 * vol * vol) * time) / (vol * time.sqrt())
}

/// Black-Scholes d2 parameter
pub fn d2(spot: f64, strike: f64, time: f64, vol: f64, rate: f64) -> f64 {
    d1(spot, strike, time, vol, rate) - vol * time.sqrt()
}

fn valid_inputs(spot: f64, strike: f64, time: f64, vol: f64, rate: f64) -> bool {
    [spot, strike, time, vol, rate].iter().all(|v| v.is_finite())
        && spot > 0.0
        && strike > 0.0
        && time > 0.0
        && vol > 0.0
}

/// Black-Scholes European option price
pub fn price(
    spot: f64,
    strike: f64,
    time: f64,
    vol: f64,
    right: OptionRight,
    rate: f64,
) -> f64 {
    if time <= 0.0 {
        return right.intrinsic(spot, strike);
    }

    let df = (-rate * time).exp();
    if vol <= 0.0 {
        // Zero vol = intrinsic value of the forward, discounted
        return df * right.intrinsic(spot / df, strike);
    }

    let d1 = d1(spot, strike, time, vol, rate);
    let d2 = d1 - vol * time.sqrt();

    match right {
        OptionRight::Call => spot * norm_cdf(d1) - strike * df * norm_cdf(d2),
        OptionRight::Put => strike * df * norm_cdf(-d2) - spot * norm_cdf(-d1),
    }
}

/// Black-Scholes Greeks
///
/// Returns `None` for expired options, non-positive spot/strike/vol and
/// non-finite inputs.
pub fn greeks(
    spot: f64,
    strike: f64,
    time: f64,
    vol: f64,
    right: OptionRight,
    rate: f64,
) -> Option<Greeks> {
    if !valid_inputs(spot, strike, time, vol, rate) {
        tracing::warn!(
            spot,
            strike,
            time,
            vol,
            rate,
            "Invalid Black-Scholes inputs, Greeks left absent"
        );
        return None;
    }

    let sqrt_t = time.sqrt();
    let vol_sqrt_t = vol * sqrt_t;
    let d1 = d1(spot, strike, time, vol, rate);
    let d2 = d1 - vol_sqrt_t;
    let df = (-rate * time).exp();
    let pdf_d1 = norm_pdf(d1);

    let delta = match right {
        OptionRight::Call => norm_cdf(d1),
        OptionRight::Put => norm_cdf(d1) - 1.0,
    };

    // Same for call and put
    let gamma = pdf_d1 / (spot * vol_sqrt_t);
    let vega = spot * pdf_d1 * sqrt_t / 100.0;

    let term1 = -spot * pdf_d1 * vol / (2.0 * sqrt_t);
    let theta = match right {
        OptionRight::Call => term1 - rate * strike * df * norm_cdf(d2),
        OptionRight::Put => term1 + rate * strike * df * norm_cdf(-d2),
    };

    let rho = match right {
        OptionRight::Call => strike * time * df * norm_cdf(d2) / 100.0,
        OptionRight::Put => -strike * time * df * norm_cdf(-d2) / 100.0,
    };

    // d(delta)/d(vol)
    let vanna = -pdf_d1 * d2 / vol;

    // d(delta)/d(t); identical for calls and puts without carry
    let charm = -pdf_d1 * (2.0 * rate * time - d2 * vol_sqrt_t) / (2.0 * time * vol_sqrt_t);

    let mut greeks = Greeks::new(delta, gamma, theta / 365.0, vega, rho, vanna);
    greeks.charm = Some(charm / 365.0).filter(|c| c.is_finite());

    if greeks.is_finite() {
        Some(greeks)
    } else {
        tracing::warn!(spot, strike, time, vol, "Non-finite Greeks dropped");
        None
    }
}

/// Implied volatility solver settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IvSolverParams {
    pub max_iterations: usize,
    /// Absolute price tolerance
    pub tolerance: f64,
}

impl Default for IvSolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-4,
        }
    }
}

/// Implied volatility with the default solver settings
pub fn implied_volatility(
    spot: f64,
    strike: f64,
    observed_price: f64,
    time: f64,
    right: OptionRight,
    rate: f64,
) -> Option<f64> {
    implied_volatility_with(
        spot,
        strike,
        observed_price,
        time,
        right,
        rate,
        IvSolverParams::default(),
    )
}

/// Newton-Raphson implied volatility
///
/// Seeded with the ATM approximation `price / (S * sqrt(T / 2π))`. Returns
/// `None` when inputs are degenerate, the price violates no-arbitrage bounds,
/// the solver does not converge, or the root falls outside
/// [`IV_FLOOR`, `IV_CEILING`].
pub fn implied_volatility_with(
    spot: f64,
    strike: f64,
    observed_price: f64,
    time: f64,
    right: OptionRight,
    rate: f64,
    params: IvSolverParams,
) -> Option<f64> {
    if !observed_price.is_finite() || observed_price <= 0.0 {
        return None;
    }
    if ![spot, strike, time, rate].iter().all(|v| v.is_finite())
        || spot <= 0.0
        || strike <= 0.0
        || time <= 0.0
    {
        return None;
    }

    // No-arbitrage bounds: no real root outside them
    let df = (-rate * time).exp();
    let lower = match right {
        OptionRight::Call => (spot - strike * df).max(0.0),
        OptionRight::Put => (strike * df - spot).max(0.0),
    };
    let upper = match right {
        OptionRight::Call => spot,
        OptionRight::Put => strike * df,
    };
    if observed_price < lower || observed_price >= upper {
        tracing::debug!(observed_price, lower, upper, "Price outside arbitrage bounds");
        return None;
    }

    let seed = observed_price / (spot * (time / (2.0 * PI)).sqrt());
    let mut vol = seed.clamp(IV_FLOOR, IV_CEILING);
    let sqrt_t = time.sqrt();

    // Price is monotone in vol, so the root stays inside [low, high]
    let mut low = IV_FLOOR / 10.0;
    let mut high = IV_CEILING * 2.5;

    for _ in 0..params.max_iterations {
        let diff = price(spot, strike, time, vol, right, rate) - observed_price;

        if diff.abs() < params.tolerance {
            return (IV_FLOOR..=IV_CEILING).contains(&vol).then_some(vol);
        }

        if diff > 0.0 {
            high = vol;
        } else {
            low = vol;
        }

        let vega = spot * norm_pdf(d1(spot, strike, time, vol, rate)) * sqrt_t;
        let newton = vol - diff / vega;

        // Newton step, or bisection when the step leaves the bracket
        vol = if vega.is_finite() && vega > MIN_VEGA && newton > low && newton < high {
            newton
        } else {
            0.5 * (low + high)
        };
    }

    tracing::debug!(spot, strike, observed_price, time, "IV solver did not converge");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: f64 = 100.0;
    const K: f64 = 100.0;
    const T: f64 = 0.25;
    const VOL: f64 = 0.2;
    const R: f64 = 0.01;

    #[test]
    fn test_norm_cdf() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-10);
        assert!((norm_cdf(1.96) - 0.975).abs() < 0.001);
        assert!((norm_cdf(-1.96) - 0.025).abs() < 0.001);
    }

    #[test]
    fn test_bs_price_parity() {
        let call = price(S, K, 1.0, VOL, OptionRight::Call, 0.05);
        let put = price(S, K, 1.0, VOL, OptionRight::Put, 0.05);

        // ~10.45 for these parameters
        assert!(call > 10.0 && call < 11.0);

        let parity = call - put - (S - K * (-0.05_f64).exp());
        assert!(parity.abs() < 1e-9);
    }

    #[test]
    fn test_reference_greeks() {
        let g = greeks(S, K, T, VOL, OptionRight::Call, R).unwrap();

        // d1 = 0.075
        assert!((g.delta - 0.5299).abs() < 1e-3);
        assert!((g.gamma - 0.0398).abs() < 1e-3);
        assert!((g.vega - 0.1989).abs() < 1e-3);
        assert!((g.theta - (-0.02314)).abs() < 1e-4);
        assert!((g.rho - 0.1222).abs() < 1e-3);
        assert!((g.vanna - 0.0497).abs() < 1e-3);
        assert!(g.charm.is_some());
    }

    #[test]
    fn test_delta_parity_and_signs() {
        for &(spot, strike, time, vol, rate) in &[
            (100.0, 100.0, 0.25, 0.2, 0.01),
            (18000.0, 17500.0, 0.05, 0.15, 0.015),
            (50.0, 80.0, 2.0, 0.6, 0.0),
            (120.0, 90.0, 0.01, 0.35, 0.05),
        ] {
            let c = greeks(spot, strike, time, vol, OptionRight::Call, rate).unwrap();
            let p = greeks(spot, strike, time, vol, OptionRight::Put, rate).unwrap();

            assert!((c.delta - p.delta - 1.0).abs() < 1e-12);
            assert!(c.gamma >= 0.0 && p.gamma >= 0.0);
            assert!(c.vega >= 0.0 && p.vega >= 0.0);
            assert!((c.gamma - p.gamma).abs() < 1e-15);
        }
    }

    #[test]
    fn test_degenerate_inputs_are_absent() {
        let cases = [
            (0.0, K, T, VOL),
            (S, K, 0.0, VOL),
            (S, K, T, 0.0),
            (S, -100.0, T, VOL),
            (S, K, -0.1, VOL),
            (f64::NAN, K, T, VOL),
            (S, K, f64::INFINITY, VOL),
        ];
        for (spot, strike, time, vol) in cases {
            for right in [OptionRight::Call, OptionRight::Put] {
                assert!(greeks(spot, strike, time, vol, right, R).is_none());
                // The solver does not take a vol, so a zero vol alone is not degenerate for it
                if vol == VOL {
                    assert!(implied_volatility(spot, strike, 5.0, time, right, R).is_none());
                }
            }
        }
    }

    #[test]
    fn test_implied_vol_round_trip() {
        for &(strike, vol, right) in &[
            (100.0, 0.2, OptionRight::Call),
            (90.0, 0.35, OptionRight::Put),
            (110.0, 0.15, OptionRight::Call),
            (105.0, 0.8, OptionRight::Put),
        ] {
            let p = price(S, strike, T, vol, right, R);
            let iv = implied_volatility(S, strike, p, T, right, R).unwrap();
            assert!((iv - vol).abs() < 1e-4, "strike {} vol {} got {}", strike, vol, iv);
        }
    }

    #[test]
    fn test_implied_vol_below_intrinsic() {
        // Deep ITM call about to expire, quoted below intrinsic
        let iv = implied_volatility(100.0, 60.0, 35.0, 1e-6, OptionRight::Call, R);
        assert!(iv.is_none());

        let iv = implied_volatility(60.0, 100.0, 39.0, 1e-6, OptionRight::Put, R);
        assert!(iv.is_none());
    }

    #[test]
    fn test_implied_vol_implausible_root() {
        // Price implies vol far above the ceiling
        let p = price(S, K, T, 3.0, OptionRight::Call, R);
        assert!(implied_volatility(S, K, p, T, OptionRight::Call, R).is_none());
    }

    #[test]
    fn test_iteration_budget() {
        let p = price(S, 130.0, T, 0.4, OptionRight::Call, R);
        let params = IvSolverParams {
            max_iterations: 1,
            tolerance: 1e-12,
        };
        assert!(implied_volatility_with(S, 130.0, p, T, OptionRight::Call, R, params).is_none());
    }
}
