//! Data sources and stores
//!
//! Handles:
//! - Option data source abstraction (broker gateway, offline, static replay)
//! - TAIFEX contract code symbology
//! - Price, contract, factor and Greeks persistence boundaries
//! - Sierra Chart SCID files and a JSON factor store

pub mod broker;
pub mod cache;
pub mod rest;
pub mod scid;
pub mod source;
pub mod store;
pub mod symbology;

pub use broker::*;
pub use cache::*;
pub use rest::*;
pub use scid::*;
pub use source::*;
pub use store::*;
pub use symbology::*;
