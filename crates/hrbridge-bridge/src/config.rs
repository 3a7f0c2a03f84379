//! Bridge configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration. Unknown fields are rejected to catch typos.

use crate::connection::ScanCycle;
use crate::dispatcher::DispatcherConfig;
use crate::error::{BridgeError, Result};
use hrbridge_core::constants::{
    BLE_DEVICE_NAME, DEFAULT_MAX_REPLY_JITTER_MS, DEFAULT_NAMED_SAMPLE_INTERVAL,
    DEFAULT_RADIO_LOCK_TIMEOUT_MS, DEFAULT_RESTART_DELAY_MS, DEFAULT_SCAN_PERIOD_MS,
    DEFAULT_SCAN_WINDOW_MS,
};
use hrbridge_hardware::RadioConfig;
use hrbridge_link::ArbiterConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Runtime configuration of the bridge.
///
/// # Examples
///
/// ```
/// use hrbridge_bridge::BridgeConfig;
///
/// let config = BridgeConfig::from_json_str(r#"{ "max_reply_jitter_ms": 500 }"#).unwrap();
/// assert_eq!(config.max_reply_jitter_ms, 500);
/// assert_eq!(config.named_sample_interval, 15);
/// assert!(BridgeConfig::from_json_str(r#"{ "jitter": 1 }"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Name advertised by the peripheral role.
    pub device_name: String,

    /// Active part of each scan cycle.
    pub scan_window_ms: u64,

    /// Length of a full scan cycle, active window included.
    pub scan_period_ms: u64,

    /// Upper bound of the random delay before answering a query.
    pub max_reply_jitter_ms: u64,

    /// Every Nth upstream sample is sent as `named_hr_data`.
    pub named_sample_interval: u32,

    pub radio_tx_lock_timeout_ms: u64,

    pub radio_rx_lock_timeout_ms: u64,

    /// Delay before rebooting after the radio fails to initialize.
    pub restart_delay_ms: u64,

    /// Transceiver parameters.
    pub radio: RadioConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_name: BLE_DEVICE_NAME.to_string(),
            scan_window_ms: DEFAULT_SCAN_WINDOW_MS,
            scan_period_ms: DEFAULT_SCAN_PERIOD_MS,
            max_reply_jitter_ms: DEFAULT_MAX_REPLY_JITTER_MS,
            named_sample_interval: DEFAULT_NAMED_SAMPLE_INTERVAL,
            radio_tx_lock_timeout_ms: DEFAULT_RADIO_LOCK_TIMEOUT_MS,
            radio_rx_lock_timeout_ms: DEFAULT_RADIO_LOCK_TIMEOUT_MS,
            restart_delay_ms: DEFAULT_RESTART_DELAY_MS,
            radio: RadioConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// `BridgeError::Json` for malformed JSON or unknown fields,
    /// `BridgeError::Config` for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check value ranges and cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() {
            return Err(BridgeError::Config("device_name must not be empty".into()));
        }
        if self.scan_window_ms == 0 {
            return Err(BridgeError::Config("scan_window_ms must be positive".into()));
        }
        if self.scan_period_ms <= self.scan_window_ms {
            return Err(BridgeError::Config(format!(
                "scan_period_ms ({}) must exceed scan_window_ms ({})",
                self.scan_period_ms, self.scan_window_ms
            )));
        }
        if self.named_sample_interval == 0 {
            return Err(BridgeError::Config(
                "named_sample_interval must be positive".into(),
            ));
        }
        if self.radio_tx_lock_timeout_ms == 0 || self.radio_rx_lock_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "radio lock timeouts must be positive".into(),
            ));
        }
        self.radio
            .validate()
            .map_err(|e| BridgeError::Config(format!("radio: {}", e)))?;
        Ok(())
    }

    pub fn scan_cycle(&self) -> ScanCycle {
        ScanCycle {
            window: Duration::from_millis(self.scan_window_ms),
            period: Duration::from_millis(self.scan_period_ms),
        }
    }

    pub fn arbiter(&self) -> ArbiterConfig {
        ArbiterConfig {
            tx_lock_timeout: Duration::from_millis(self.radio_tx_lock_timeout_ms),
            rx_lock_timeout: Duration::from_millis(self.radio_rx_lock_timeout_ms),
        }
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_reply_jitter: Duration::from_millis(self.max_reply_jitter_ms),
            named_sample_interval: self.named_sample_interval,
        }
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}
