//! Common types shared across hardware device implementations.

use crate::error::{HardwareError, Result};
use hrbridge_core::{Address, DeviceInfo};
use serde::{Deserialize, Serialize};

/// Sync word for private LoRa networks.
pub const SYNC_WORD_PRIVATE: u8 = 0x12;

/// Bandwidths the transceiver supports, in kHz.
pub const SUPPORTED_BANDWIDTHS_KHZ: [f32; 3] = [125.0, 250.0, 500.0];

/// LoRa modem parameters applied by [`RadioDevice::begin`](crate::traits::RadioDevice::begin).
///
/// # Examples
///
/// ```
/// use hrbridge_hardware::types::RadioConfig;
///
/// let config = RadioConfig::default();
/// assert_eq!(config.frequency_mhz, 434.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RadioConfig {
    /// Carrier frequency in MHz.
    pub frequency_mhz: f32,

    /// Channel bandwidth in kHz.
    pub bandwidth_khz: f32,

    /// Spreading factor.
    pub spreading_factor: u8,

    /// Coding rate denominator (4/x).
    pub coding_rate: u8,

    /// Sync word.
    pub sync_word: u8,

    /// Output power in dBm.
    pub output_power_dbm: i8,

    /// Preamble length in symbols.
    pub preamble_length: u16,

    /// TCXO reference voltage in volts (0 disables the TCXO).
    pub tcxo_voltage: f32,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            frequency_mhz: 434.0,
            bandwidth_khz: 500.0,
            spreading_factor: 7,
            coding_rate: 7,
            sync_word: SYNC_WORD_PRIVATE,
            output_power_dbm: 22,
            preamble_length: 8,
            tcxo_voltage: 1.6,
        }
    }
}

impl RadioConfig {
    /// Check the parameters against the transceiver's supported ranges.
    ///
    /// # Errors
    /// Returns `HardwareError::InvalidConfig` naming the first parameter
    /// out of range.
    pub fn validate(&self) -> Result<()> {
        let invalid = HardwareError::invalid_config;

        if !(150.0..=960.0).contains(&self.frequency_mhz) {
            return Err(invalid(
                "frequency",
                format!("{} MHz out of range 150-960", self.frequency_mhz),
            ));
        }
        if !SUPPORTED_BANDWIDTHS_KHZ.contains(&self.bandwidth_khz) {
            return Err(invalid(
                "bandwidth",
                format!("unsupported {} kHz", self.bandwidth_khz),
            ));
        }
        if !(5..=11).contains(&self.spreading_factor) {
            return Err(invalid(
                "spreading factor",
                format!("SF{} out of range 5-11", self.spreading_factor),
            ));
        }
        if !(5..=8).contains(&self.coding_rate) {
            return Err(invalid(
                "coding rate",
                format!("4/{} out of range 4/5-4/8", self.coding_rate),
            ));
        }
        if !(-9..=22).contains(&self.output_power_dbm) {
            return Err(invalid(
                "output power",
                format!("{} dBm out of range -9..22", self.output_power_dbm),
            ));
        }
        if self.preamble_length == 0 {
            return Err(invalid("preamble length", "must be non-zero".to_string()));
        }
        if !(0.0..=3.3).contains(&self.tcxo_voltage) {
            return Err(invalid(
                "TCXO voltage",
                format!("{} V out of range 0-3.3", self.tcxo_voltage),
            ));
        }
        Ok(())
    }
}

/// Operating mode of the transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioMode {
    /// Not initialised.
    #[default]
    Sleep,
    Standby,
    Transmit,
    /// Listening for packets.
    Receive,
}

/// Event reported by the BLE central role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CentralEvent {
    /// An advertisement was observed during a scan.
    Advertisement { device: DeviceInfo, rssi: i16 },

    /// A subscribed peer sent a heart-rate measurement notification.
    Notification { address: Address, payload: Vec<u8> },

    /// A connected peer dropped the link.
    Disconnected { address: Address },
}

/// Event reported by the BLE peripheral role (GATT server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralEvent {
    /// A client wrote the whitelist characteristic.
    WhitelistWrite(Vec<u8>),

    /// A client connected to the GATT server.
    ClientConnected,

    /// A client disconnected from the GATT server.
    ClientDisconnected,

    /// A client negotiated a new MTU.
    MtuChanged(u16),
}
