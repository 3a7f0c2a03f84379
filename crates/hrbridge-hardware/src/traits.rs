//! Hardware collaborator trait definitions.
//!
//! These traits are the boundary between the bridge's control plane and the
//! platform plumbing it drives: the sub-GHz transceiver, the BLE central role
//! that talks to the upstream heart-rate monitor, and the BLE peripheral role
//! (GATT server) exposed to operators.
//!
//! Methods return `impl Future + Send` (Edition 2024 RPITIT) so generic
//! components can be spawned on the Tokio runtime. Implementations may simply
//! write `async fn`.
//!
//! # Object Safety
//!
//! **NOTE**: These traits are NOT object-safe. Use generic type parameters:
//!
//! ```no_run
//! use hrbridge_hardware::traits::RadioDevice;
//! use hrbridge_hardware::error::Result;
//!
//! async fn send_once<R: RadioDevice>(radio: &mut R, frame: &[u8]) -> Result<()> {
//!     radio.transmit(frame).await?;
//!     radio.start_receive().await
//! }
//! ```

use crate::error::Result;
use crate::types::{CentralEvent, PeripheralEvent, RadioConfig};
use hrbridge_core::constants::{HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID};
use hrbridge_core::{Address, DeviceInfo};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

/// Half-duplex LoRa transceiver.
///
/// The transceiver is a single shared resource: callers serialise access
/// themselves (see the radio arbiter in `hrbridge-link`).
///
/// # Receive Model
///
/// After [`start_receive`](Self::start_receive) the device signals its
/// [`interrupt`](Self::interrupt) whenever a packet lands in its FIFO. The
/// packet is then inspected with [`packet_length`](Self::packet_length) and
/// copied out with [`read_data`](Self::read_data). Re-arming the receiver
/// discards a packet that was inspected but not read.
pub trait RadioDevice: Send + 'static {
    /// Initialise the modem with the given parameters.
    fn begin(&mut self, config: &RadioConfig) -> impl Future<Output = Result<()>> + Send;

    /// Transmit one packet, blocking until it is on air or the driver times out.
    fn transmit(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Put the modem in standby.
    fn standby(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Start continuous reception.
    fn start_receive(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Length of the packet waiting in the FIFO, 0 if none.
    fn packet_length(&mut self) -> impl Future<Output = Result<usize>> + Send;

    /// Copy the waiting packet into `buf`, returning the number of bytes read.
    fn read_data(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize>> + Send;

    /// Wake signal raised by the packet-received interrupt.
    fn interrupt(&self) -> Arc<Notify>;
}

/// BLE central role: scans for and connects to upstream sensors.
///
/// Handles are cheap to clone; all clones drive the same stack.
pub trait BleCentral: Clone + Send + Sync + 'static {
    /// Connection to one peer.
    type Link: PeerLink;

    /// Start an active scan that runs for `window` and returns immediately.
    ///
    /// Advertisements are reported as [`CentralEvent::Advertisement`].
    fn start_scan(&self, window: Duration) -> impl Future<Output = Result<()>> + Send;

    /// Stop a running scan. Stopping an idle scanner is not an error.
    fn stop_scan(&self) -> impl Future<Output = Result<()>> + Send;

    /// Connect to the peer with the given address.
    fn connect(&self, address: Address) -> impl Future<Output = Result<Self::Link>> + Send;

    /// Take the event stream. Returns `None` after the first call.
    fn take_events(&self) -> Option<mpsc::Receiver<CentralEvent>>;
}

/// An established connection to an upstream peer.
///
/// Dropping the link without calling [`disconnect`](Self::disconnect) leaves
/// the connection to the stack; the bridge always disconnects explicitly.
pub trait PeerLink: Send + Sync + 'static {
    /// Address of the connected peer.
    fn address(&self) -> Address;

    /// Subscribe to notifications of `characteristic` in `service`.
    ///
    /// Fails if the peer does not expose the characteristic.
    fn subscribe(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Subscribe to Heart Rate Measurement (0x2A37) notifications of the
    /// standard Heart Rate service (0x180D).
    fn subscribe_heart_rate(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.subscribe(HEART_RATE_SERVICE_UUID, HEART_RATE_MEASUREMENT_UUID)
    }

    /// Tear the connection down, consuming the handle.
    fn disconnect(self) -> impl Future<Output = Result<()>> + Send;
}

/// BLE peripheral role: the GATT server operators and displays connect to.
pub trait BlePeripheral: Clone + Send + Sync + 'static {
    /// Public address of this device, used as the bridge's own address on
    /// the radio link.
    fn address(&self) -> Address;

    /// (Re)start advertising the heart-rate service under `name`.
    fn start_advertising(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Republish a raw Heart Rate Measurement payload to subscribed clients.
    fn notify_heart_rate(&self, payload: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Set the value returned by the next read of the whitelist characteristic.
    fn set_whitelist_value(&self, value: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Announce a device observed while scanning.
    fn announce_candidate(&self, device: &DeviceInfo) -> impl Future<Output = Result<()>> + Send;

    /// Take the event stream. Returns `None` after the first call.
    fn take_events(&self) -> Option<mpsc::Receiver<PeripheralEvent>>;
}
