//! Core constants for the heart-rate bridge.
//!
//! This module collects the protocol-level and timing constants shared by every
//! crate in the workspace: radio frame limits, addressing, BLE identifiers,
//! persisted preference keys, and the default cadence of scanning and replies.
//!
//! # Radio Frame Structure
//!
//! Every frame on the sub-GHz link starts with a one-byte magic tag that
//! selects a fixed payload layout:
//!
//! ```text
//! +-------+---------------------------+
//! | magic | type-specific payload ... |
//! +-------+---------------------------+
//!   1 B     up to MAX_FRAME_SIZE - 1
//! ```
//!
//! # Usage
//!
//! ```
//! use hrbridge_core::constants::*;
//!
//! assert_eq!(ADDR_SIZE, 6);
//! assert!(DEFAULT_SCAN_PERIOD_MS > DEFAULT_SCAN_WINDOW_MS);
//! ```

use uuid::Uuid;

// ============================================================================
// Addressing
// ============================================================================

/// Size of a BLE link-layer address in bytes.
pub const ADDR_SIZE: usize = 6;

/// Reserved address matched by every repeater regardless of its own address.
pub const BROADCAST_ADDRESS: [u8; ADDR_SIZE] = [0xFF; ADDR_SIZE];

// ============================================================================
// Radio Frames
// ============================================================================

/// Largest frame the transceiver can carry in a single packet.
pub const MAX_FRAME_SIZE: usize = 255;

/// Upstream device names are truncated to this many bytes when carried in a
/// `repeater_status` frame.
pub const MAX_DEVICE_NAME_LEN: usize = 16;

/// Decoded heart-rate values above this are capped.
pub const MAX_HEART_RATE: u16 = 255;

/// Identity key used when none has been persisted.
pub const DEFAULT_IDENTITY_KEY: u8 = 0;

// ============================================================================
// Timing
// ============================================================================

/// Active part of a scan cycle.
pub const DEFAULT_SCAN_WINDOW_MS: u64 = 2500;

/// Full scan cycle (active window plus idle time).
pub const DEFAULT_SCAN_PERIOD_MS: u64 = 5000;

/// Upper bound of the random delay before replying to a broadcast query.
pub const DEFAULT_MAX_REPLY_JITTER_MS: u64 = 3000;

/// Every Nth upstream sample is sent as `named_hr_data`.
pub const DEFAULT_NAMED_SAMPLE_INTERVAL: u32 = 15;

/// Bounded wait for the radio lock.
pub const DEFAULT_RADIO_LOCK_TIMEOUT_MS: u64 = 100;

/// Delay before the process restarts after a fatal initialisation failure.
pub const DEFAULT_RESTART_DELAY_MS: u64 = 1000;

// ============================================================================
// BLE Identifiers
// ============================================================================

/// Name advertised by the bridge's peripheral role.
pub const BLE_DEVICE_NAME: &str = "LoRA-Adapter";

/// Standard Heart Rate service (0x180D).
pub const HEART_RATE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);

/// Standard Heart Rate Measurement characteristic (0x2A37).
pub const HEART_RATE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);

/// Whitelist control characteristic (read/write/notify).
pub const WHITELIST_CHAR_UUID: Uuid = Uuid::from_u128(0x12a481f0_9384_413d_b002_f8660566d3b0);

/// Candidate announcement characteristic (read/notify).
pub const CANDIDATE_CHAR_UUID: Uuid = Uuid::from_u128(0xa2f05114_fdb6_4549_ae2a_845b4be1ac48);

/// Whitelist characteristic values never exceed this length.
pub const MAX_WHITELIST_VALUE_LEN: usize = 64;

// ============================================================================
// Persisted Preferences
// ============================================================================

/// Namespace holding all bridge preferences.
pub const PREF_NAMESPACE: &str = "st";

/// Key of the 6-byte last-known target address blob.
pub const PREF_ADDR_KEY: &str = "addr";

/// Key of the 1-byte identity key.
pub const PREF_NAME_MAP_KEY: &str = "nmk";
