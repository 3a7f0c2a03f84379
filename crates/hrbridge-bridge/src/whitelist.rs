//! Whitelist control channel.
//!
//! Writes on the whitelist characteristic reconfigure the upstream target:
//!
//! - a list holding one address record sets the target
//! - `REQUEST` publishes the current target for the next read
//! - `DISCONNECT` clears the target
//!
//! Lists with more than one element and name records are not supported and
//! are ignored, as are writes that fail to decode. Ignored writes produce no
//! response.

use crate::connection::ConnectionHandle;
use hrbridge_hardware::BlePeripheral;
use hrbridge_protocol::{WhitelistCommand, WhitelistItem, WhitelistRequest, WhitelistResponse};
use tracing::{debug, info, warn};

/// What a whitelist write resulted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistAction {
    /// The target was forwarded to the connection manager.
    TargetSet,
    /// A response was published; carries the encoded value.
    Responded(Vec<u8>),
    /// The target was cleared.
    TargetCleared,
    /// The write was logged and ignored.
    Ignored,
}

/// Handler for writes on the whitelist characteristic.
pub struct WhitelistChannel<P> {
    connection: ConnectionHandle,
    peripheral: P,
}

impl<P: BlePeripheral> WhitelistChannel<P> {
    pub fn new(connection: ConnectionHandle, peripheral: P) -> Self {
        Self {
            connection,
            peripheral,
        }
    }

    /// Handle one characteristic write.
    pub async fn on_write(&self, value: &[u8]) -> WhitelistAction {
        let request = match WhitelistRequest::decode(value) {
            Ok(request) => request,
            Err(e) => {
                warn!("Ignoring whitelist write: {}", e);
                return WhitelistAction::Ignored;
            }
        };

        match request {
            WhitelistRequest::List(items) => self.on_list(items).await,
            WhitelistRequest::Command(WhitelistCommand::Request) => self.on_request().await,
            WhitelistRequest::Command(WhitelistCommand::Disconnect) => {
                info!("Whitelist DISCONNECT");
                if !self.connection.clear_target().await {
                    return WhitelistAction::Ignored;
                }
                WhitelistAction::TargetCleared
            }
        }
    }

    async fn on_list(&self, items: Vec<WhitelistItem>) -> WhitelistAction {
        let address = match items.as_slice() {
            [WhitelistItem::Address(address)] => *address,
            [WhitelistItem::Name(name)] => {
                warn!("Ignoring whitelist name record {:?}: unsupported", name);
                return WhitelistAction::Ignored;
            }
            [] => {
                warn!("Ignoring empty whitelist");
                return WhitelistAction::Ignored;
            }
            _ => {
                warn!(
                    "Ignoring whitelist with {} elements, only one is supported",
                    items.len()
                );
                return WhitelistAction::Ignored;
            }
        };

        info!("Whitelist target {}", address);
        if !self.connection.set_target(address).await {
            return WhitelistAction::Ignored;
        }
        WhitelistAction::TargetSet
    }

    async fn on_request(&self) -> WhitelistAction {
        let target = self.connection.target().await;
        let value = match WhitelistResponse::for_target(target).encode() {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to encode whitelist response: {}", e);
                return WhitelistAction::Ignored;
            }
        };

        if let Err(e) = self.peripheral.set_whitelist_value(&value).await {
            warn!("Failed to publish whitelist response: {}", e);
            return WhitelistAction::Ignored;
        }
        debug!("Whitelist REQUEST answered with {:02X?}", value);
        WhitelistAction::Responded(value)
    }
}
