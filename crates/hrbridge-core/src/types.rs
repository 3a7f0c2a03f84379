use crate::{
    Result,
    constants::{ADDR_SIZE, BROADCAST_ADDRESS, DEFAULT_IDENTITY_KEY, MAX_DEVICE_NAME_LEN},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// BLE link-layer address (6 bytes).
///
/// Displayed most-significant byte first as `AA:BB:CC:DD:EE:FF`, in the same
/// byte order it is carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address([u8; ADDR_SIZE]);

impl Address {
    /// Address matched by every repeater.
    pub const BROADCAST: Address = Address(BROADCAST_ADDRESS);

    /// Create an address from its raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; ADDR_SIZE]) -> Self {
        Address(bytes)
    }

    /// Create an address from a slice.
    ///
    /// # Errors
    /// Returns `Error::InvalidAddress` if the slice is not exactly 6 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; ADDR_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidAddress(format!(
                "expected {ADDR_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Address(raw))
    }

    /// Get the raw address bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ADDR_SIZE] {
        &self.0
    }

    /// Check whether this is the broadcast address.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.0 == BROADCAST_ADDRESS
    }

    /// Check whether a query carrying this address targets `own`.
    ///
    /// ```
    /// use hrbridge_core::Address;
    ///
    /// let own = Address::new([1, 2, 3, 4, 5, 6]);
    /// assert!(Address::BROADCAST.targets(&own));
    /// assert!(own.targets(&own));
    /// assert!(!Address::new([9; 6]).targets(&own));
    /// ```
    #[must_use]
    pub fn targets(&self, own: &Address) -> bool {
        self.is_broadcast() || self == own
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    /// Parse `AA:BB:CC:DD:EE:FF`, `AA-BB-CC-DD-EE-FF` or `AABBCCDDEEFF`.
    fn from_str(s: &str) -> Result<Self> {
        let hex: String = s
            .trim()
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect();

        if hex.len() != ADDR_SIZE * 2 || !hex.is_ascii() {
            return Err(Error::InvalidAddress(format!("Malformed address: {s}")));
        }

        let mut raw = [0u8; ADDR_SIZE];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidAddress(format!("Malformed address: {s}")))?;
        }
        Ok(Address(raw))
    }
}

impl From<[u8; ADDR_SIZE]> for Address {
    fn from(bytes: [u8; ADDR_SIZE]) -> Self {
        Address(bytes)
    }
}

/// Compact one-byte identity of this bridge towards peer repeaters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey(u8);

impl IdentityKey {
    #[must_use]
    pub const fn new(key: u8) -> Self {
        IdentityKey(key)
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl Default for IdentityKey {
    fn default() -> Self {
        IdentityKey(DEFAULT_IDENTITY_KEY)
    }
}

impl From<u8> for IdentityKey {
    fn from(key: u8) -> Self {
        IdentityKey(key)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name and address of an upstream BLE device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Advertised name, possibly empty.
    pub name: String,

    /// Link-layer address.
    pub address: Address,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }

    /// Name truncated to at most `MAX_DEVICE_NAME_LEN` bytes on a character
    /// boundary, as carried in radio frames.
    #[must_use]
    pub fn transport_name(&self) -> &str {
        if self.name.len() <= MAX_DEVICE_NAME_LEN {
            return &self.name;
        }
        let mut end = MAX_DEVICE_NAME_LEN;
        while !self.name.is_char_boundary(end) {
            end -= 1;
        }
        &self.name[..end]
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} ({})", self.name, self.address)
        }
    }
}
