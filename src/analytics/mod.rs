//! Chain analytics
//!
//! - Daily factor calculation (PCR, ATM IV, skew, max pain, exposures)
//! - Option chain assembly from contracts and latest prices
//! - Per-contract Greeks from observed prices

pub mod chain;
pub mod factors;
pub mod greeks_job;

pub use chain::*;
pub use factors::*;
pub use greeks_job::*;
