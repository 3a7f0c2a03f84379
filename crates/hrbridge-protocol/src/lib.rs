//! Wire formats of the heart-rate bridge.
//!
//! - [`frame`]: magic-tagged radio frames exchanged with peer repeaters
//! - [`measurement`]: decoding of GATT Heart Rate Measurement notifications
//! - [`whitelist`]: request/response encoding of the whitelist characteristic

pub mod frame;
pub mod measurement;
pub mod whitelist;

pub use frame::{Magic, RadioFrame, RepeaterStatus};
pub use measurement::parse_heart_rate;
pub use whitelist::{
    WhitelistCommand, WhitelistErrorCode, WhitelistItem, WhitelistRequest, WhitelistResponse,
};
