use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Wire protocol errors
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Frame too short for {kind}: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        kind: String,
        expected: usize,
        actual: usize,
    },

    #[error("Frame too large: {size} bytes exceeds maximum of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Unknown magic byte: 0x{0:02X}")]
    UnknownMagic(u8),

    #[error("Invalid heart rate measurement: {0}")]
    InvalidMeasurement(String),

    #[error("Invalid whitelist request: {0}")]
    InvalidRequest(String),

    // Addressing errors
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    // State machine errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Task plumbing errors
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a frame-too-short error for the given frame kind.
    pub fn too_short(kind: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::FrameTooShort {
            kind: kind.into(),
            expected,
            actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
