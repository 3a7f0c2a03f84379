use hrbridge_hardware::HardwareError;
use thiserror::Error;

/// Errors surfaced while loading configuration or booting the bridge.
///
/// Once running, components report failures through logs and boolean or
/// outcome results; nothing below propagates out of a running task.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Radio initialization failed: {0}")]
    RadioInit(#[source] HardwareError),

    #[error("BLE initialization failed: {0}")]
    BleInit(#[source] HardwareError),

    #[error("{0} event stream already taken")]
    EventsTaken(&'static str),

    #[error("Invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure is the radio bring-up failure that warrants a
    /// full restart.
    ///
    /// # Examples
    ///
    /// ```
    /// use hrbridge_bridge::BridgeError;
    /// use hrbridge_hardware::HardwareError;
    ///
    /// assert!(BridgeError::RadioInit(HardwareError::Code(-2)).is_fatal_init());
    /// assert!(!BridgeError::Config("bad".into()).is_fatal_init());
    /// ```
    pub fn is_fatal_init(&self) -> bool {
        matches!(self, BridgeError::RadioInit(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
