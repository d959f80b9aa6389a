//! Pricing Models
//!
//! Black-Scholes pricing, Greeks and implied volatility. The factor
//! calculator and the Greeks job both price through this module.

pub mod black_scholes;

pub use black_scholes::*;
