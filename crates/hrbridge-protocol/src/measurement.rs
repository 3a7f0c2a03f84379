//! Decoding of GATT Heart Rate Measurement notifications.
//!
//! Only the heart-rate value is extracted; energy expended and RR intervals
//! are ignored.
//!
//! ```text
//! +-------+----------------------+-----
//! | flags | hr (u8 or u16 LE)    | ...
//! +-------+----------------------+-----
//!   bit 0 of flags selects the width of hr
//! ```

use hrbridge_core::{Error, Result, constants::MAX_HEART_RATE};

/// Flags bit selecting a 16-bit heart-rate value.
const FLAG_HR_U16: u8 = 0x01;

/// Decode the heart-rate value of a measurement notification.
///
/// Values above 255 are capped.
///
/// # Errors
/// Returns `Error::InvalidMeasurement` if the payload is shorter than its
/// flags require or the value is zero.
///
/// # Examples
/// ```
/// use hrbridge_protocol::parse_heart_rate;
///
/// assert_eq!(parse_heart_rate(&[0x00, 72]).unwrap(), 72);
/// assert_eq!(parse_heart_rate(&[0x01, 0x2C, 0x01]).unwrap(), 255);
/// assert!(parse_heart_rate(&[0x00]).is_err());
/// ```
pub fn parse_heart_rate(payload: &[u8]) -> Result<u8> {
    if payload.len() < 2 {
        return Err(Error::InvalidMeasurement(format!(
            "payload too short: {} bytes",
            payload.len()
        )));
    }

    let value: u16 = if payload[0] & FLAG_HR_U16 != 0 {
        let Some(raw) = payload.get(1..3) else {
            return Err(Error::InvalidMeasurement(
                "16-bit value truncated".to_string(),
            ));
        };
        u16::from_le_bytes([raw[0], raw[1]])
    } else {
        u16::from(payload[1])
    };

    if value == 0 {
        return Err(Error::InvalidMeasurement("heart rate is zero".to_string()));
    }

    Ok(value.min(MAX_HEART_RATE) as u8)
}
