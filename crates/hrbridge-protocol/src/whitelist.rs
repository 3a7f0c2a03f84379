//! Wire format of the whitelist control characteristic.
//!
//! Requests and responses are small tagged unions that always fit in a
//! single characteristic value of at most
//! [`MAX_WHITELIST_VALUE_LEN`](hrbridge_core::constants::MAX_WHITELIST_VALUE_LEN)
//! bytes.
//!
//! # Request
//!
//! ```text
//! 0x01 | count | item*        list of items
//! 0x02 | command              0x00 = REQUEST, 0x01 = DISCONNECT
//! ```
//!
//! # Response
//!
//! ```text
//! 0x01 | count | item*        current target
//! 0x02 | error_code           0x00 = NULL (no target)
//! ```
//!
//! # Item
//!
//! ```text
//! 0x01 | len | name[len]      name record
//! 0x02 | addr[6]              address record
//! ```
//!
//! # Examples
//!
//! ```
//! use hrbridge_core::Address;
//! use hrbridge_protocol::{WhitelistItem, WhitelistRequest};
//!
//! let bytes = [0x01, 0x01, 0x02, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
//! let request = WhitelistRequest::decode(&bytes).unwrap();
//! let target: Address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
//! assert_eq!(request, WhitelistRequest::List(vec![WhitelistItem::Address(target)]));
//! ```

use hrbridge_core::{
    Address, Error, Result,
    constants::{ADDR_SIZE, MAX_WHITELIST_VALUE_LEN},
};

const TAG_LIST: u8 = 0x01;
const TAG_COMMAND: u8 = 0x02;
const TAG_ERROR: u8 = 0x02;

const ITEM_NAME: u8 = 0x01;
const ITEM_ADDRESS: u8 = 0x02;

/// One element of a whitelist list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistItem {
    /// Match by advertised name. Decoded but not honoured by the bridge.
    Name(String),
    /// Match by link-layer address.
    Address(Address),
}

/// Command form of a whitelist request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WhitelistCommand {
    /// Read back the current target address.
    Request = 0x00,
    /// Clear the target address and drop the upstream connection.
    Disconnect = 0x01,
}

impl TryFrom<u8> for WhitelistCommand {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(WhitelistCommand::Request),
            0x01 => Ok(WhitelistCommand::Disconnect),
            other => Err(Error::InvalidRequest(format!(
                "unknown command 0x{other:02X}"
            ))),
        }
    }
}

/// A decoded write on the whitelist characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistRequest {
    List(Vec<WhitelistItem>),
    Command(WhitelistCommand),
}

/// Error codes a response can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WhitelistErrorCode {
    /// No target address is configured.
    Null = 0x00,
}

/// Value exposed for the next read of the whitelist characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistResponse {
    List(Vec<WhitelistItem>),
    Error(WhitelistErrorCode),
}

impl WhitelistRequest {
    /// Decode a characteristic write.
    ///
    /// # Errors
    /// Returns `Error::InvalidRequest` for empty, oversized, truncated or
    /// unknown-tag values.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_bound(data.len())?;
        let (&tag, body) = data
            .split_first()
            .ok_or_else(|| Error::InvalidRequest("empty value".to_string()))?;

        match tag {
            TAG_LIST => Ok(WhitelistRequest::List(decode_items(body)?)),
            TAG_COMMAND => {
                let &command = body
                    .first()
                    .ok_or_else(|| Error::InvalidRequest("missing command byte".to_string()))?;
                Ok(WhitelistRequest::Command(WhitelistCommand::try_from(command)?))
            }
            other => Err(Error::InvalidRequest(format!("unknown tag 0x{other:02X}"))),
        }
    }

    /// Encode the request, as written by a configuring client.
    ///
    /// # Errors
    /// Returns `Error::InvalidRequest` if the value would exceed the
    /// characteristic size.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(MAX_WHITELIST_VALUE_LEN);
        match self {
            WhitelistRequest::List(items) => {
                out.push(TAG_LIST);
                encode_items(items, &mut out)?;
            }
            WhitelistRequest::Command(command) => {
                out.push(TAG_COMMAND);
                out.push(*command as u8);
            }
        }
        check_bound(out.len())?;
        Ok(out)
    }
}

impl WhitelistResponse {
    /// Response describing the current target, or `Null` if there is none.
    pub fn for_target(target: Option<Address>) -> Self {
        match target {
            Some(address) => WhitelistResponse::List(vec![WhitelistItem::Address(address)]),
            None => WhitelistResponse::Error(WhitelistErrorCode::Null),
        }
    }

    /// Encode the response value.
    ///
    /// # Errors
    /// Returns `Error::InvalidRequest` if the value would exceed the
    /// characteristic size.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(MAX_WHITELIST_VALUE_LEN);
        match self {
            WhitelistResponse::List(items) => {
                out.push(TAG_LIST);
                encode_items(items, &mut out)?;
            }
            WhitelistResponse::Error(code) => {
                out.push(TAG_ERROR);
                out.push(*code as u8);
            }
        }
        check_bound(out.len())?;
        Ok(out)
    }

    /// Decode a value read back from the characteristic.
    ///
    /// # Errors
    /// Returns `Error::InvalidRequest` for malformed values.
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_bound(data.len())?;
        let (&tag, body) = data
            .split_first()
            .ok_or_else(|| Error::InvalidRequest("empty value".to_string()))?;

        match tag {
            TAG_LIST => Ok(WhitelistResponse::List(decode_items(body)?)),
            TAG_ERROR => match body.first() {
                Some(0x00) => Ok(WhitelistResponse::Error(WhitelistErrorCode::Null)),
                Some(other) => Err(Error::InvalidRequest(format!(
                    "unknown error code 0x{other:02X}"
                ))),
                None => Err(Error::InvalidRequest("missing error code".to_string())),
            },
            other => Err(Error::InvalidRequest(format!("unknown tag 0x{other:02X}"))),
        }
    }
}

fn check_bound(len: usize) -> Result<()> {
    if len > MAX_WHITELIST_VALUE_LEN {
        return Err(Error::InvalidRequest(format!(
            "value of {len} bytes exceeds {MAX_WHITELIST_VALUE_LEN}"
        )));
    }
    Ok(())
}

fn decode_items(body: &[u8]) -> Result<Vec<WhitelistItem>> {
    let (&count, mut rest) = body
        .split_first()
        .ok_or_else(|| Error::InvalidRequest("missing item count".to_string()))?;

    let mut items = Vec::with_capacity(count as usize);
    for index in 0..count {
        let truncated = || Error::InvalidRequest(format!("item {index} truncated"));
        let (&kind, after_kind) = rest.split_first().ok_or_else(truncated)?;
        match kind {
            ITEM_NAME => {
                let (&len, after_len) = after_kind.split_first().ok_or_else(truncated)?;
                let name = after_len.get(..len as usize).ok_or_else(truncated)?;
                let name = String::from_utf8(name.to_vec()).map_err(|_| {
                    Error::InvalidRequest(format!("item {index} name is not UTF-8"))
                })?;
                items.push(WhitelistItem::Name(name));
                rest = &after_len[len as usize..];
            }
            ITEM_ADDRESS => {
                let raw = after_kind.get(..ADDR_SIZE).ok_or_else(truncated)?;
                items.push(WhitelistItem::Address(Address::from_slice(raw)?));
                rest = &after_kind[ADDR_SIZE..];
            }
            other => {
                return Err(Error::InvalidRequest(format!(
                    "item {index} has unknown kind 0x{other:02X}"
                )));
            }
        }
    }
    Ok(items)
}

fn encode_items(items: &[WhitelistItem], out: &mut Vec<u8>) -> Result<()> {
    let count = u8::try_from(items.len())
        .map_err(|_| Error::InvalidRequest(format!("too many items: {}", items.len())))?;
    out.push(count);
    for item in items {
        match item {
            WhitelistItem::Name(name) => {
                let len = u8::try_from(name.len()).map_err(|_| {
                    Error::InvalidRequest(format!("name of {} bytes too long", name.len()))
                })?;
                out.push(ITEM_NAME);
                out.push(len);
                out.extend_from_slice(name.as_bytes());
            }
            WhitelistItem::Address(address) => {
                out.push(ITEM_ADDRESS);
                out.extend_from_slice(address.as_bytes());
            }
        }
    }
    Ok(())
}
