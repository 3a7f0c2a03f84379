//! Shared vocabulary of the heart-rate bridge: BLE addresses, identity keys,
//! device descriptors, wire constants and the common error type.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
