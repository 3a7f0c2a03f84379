//! Failures reported by the BLE stack and the radio transceiver.
//!
//! Radio variants mirror the status codes of an SX126x-class driver; anything
//! the driver reports without a dedicated variant is kept as a raw [`Code`].
//!
//! [`Code`]: HardwareError::Code

use hrbridge_core::Address;

pub type Result<T> = std::result::Result<T, HardwareError>;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The peer is not (or no longer) connected.
    #[error("{0} is not connected")]
    NotConnected(Address),

    /// A BLE operation failed.
    #[error("BLE {operation} failed: {reason}")]
    Ble {
        operation: &'static str,
        reason: String,
    },

    /// An event channel between the stack and the bridge was closed.
    #[error("{0} event channel closed")]
    ChannelClosed(&'static str),

    /// A radio operation was attempted before `begin`.
    #[error("Radio not initialised")]
    RadioNotStarted,

    #[error("Invalid radio {parameter}: {reason}")]
    InvalidConfig {
        parameter: &'static str,
        reason: String,
    },

    #[error("Radio transmit timeout")]
    TxTimeout,

    #[error("Radio receive timeout")]
    RxTimeout,

    #[error("Radio CRC mismatch")]
    CrcMismatch,

    #[error("Radio invalid header")]
    InvalidHeader,

    /// Packet does not fit the radio FIFO or the caller's buffer.
    #[error("Packet too large: {size} bytes exceeds {max}")]
    PacketTooLarge { size: usize, max: usize },

    /// Raw driver status code.
    #[error("Radio driver status {0}")]
    Code(i16),
}

impl HardwareError {
    pub fn ble(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Ble {
            operation,
            reason: reason.into(),
        }
    }

    pub fn invalid_config(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            parameter,
            reason: reason.into(),
        }
    }

    pub fn packet_too_large(size: usize, max: usize) -> Self {
        Self::PacketTooLarge { size, max }
    }

    /// Whether the failure concerns the radio rather than BLE.
    pub fn is_radio(&self) -> bool {
        !matches!(
            self,
            Self::NotConnected(_) | Self::Ble { .. } | Self::ChannelClosed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ble_errors_display() {
        let address = Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(
            HardwareError::NotConnected(address).to_string(),
            "AA:BB:CC:DD:EE:FF is not connected"
        );
        assert_eq!(
            HardwareError::ble("subscribe", "characteristic not found").to_string(),
            "BLE subscribe failed: characteristic not found"
        );
        assert!(!HardwareError::ChannelClosed("peripheral").is_radio());
    }

    #[test]
    fn test_radio_errors_display() {
        assert_eq!(HardwareError::TxTimeout.to_string(), "Radio transmit timeout");
        assert_eq!(HardwareError::CrcMismatch.to_string(), "Radio CRC mismatch");
        assert_eq!(
            HardwareError::packet_too_large(300, 255).to_string(),
            "Packet too large: 300 bytes exceeds 255"
        );
        assert_eq!(HardwareError::Code(-2).to_string(), "Radio driver status -2");
        assert!(HardwareError::Code(-2).is_radio());
        assert!(HardwareError::RadioNotStarted.is_radio());
    }

    #[test]
    fn test_invalid_config_names_parameter() {
        let error = HardwareError::invalid_config("bandwidth", "unsupported 300 kHz");
        assert!(matches!(
            error,
            HardwareError::InvalidConfig {
                parameter: "bandwidth",
                ..
            }
        ));
        assert_eq!(error.to_string(), "Invalid radio bandwidth: unsupported 300 kHz");
    }
}
