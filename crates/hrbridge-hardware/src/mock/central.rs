//! Mock BLE central role for testing and development.
//!
//! The handle plays the part of the radio environment: it registers
//! advertisers that show up while scanning, sends notifications from
//! subscribed peers and drops links from the remote side.

use crate::{
    HardwareError, Result,
    traits::{BleCentral, PeerLink},
    types::CentralEvent,
};
use hrbridge_core::constants::{HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID};
use hrbridge_core::{Address, DeviceInfo};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Capacity of the central event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Calls made on the central and its links, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCall {
    Connect(Address),
    Disconnect(Address),
}

#[derive(Debug, Default)]
struct CentralState {
    advertisers: Vec<(DeviceInfo, i16)>,
    scanning: bool,
    scan_starts: usize,
    scan_stops: usize,
    connected: HashSet<Address>,
    subscribed: HashSet<Address>,
    connect_attempts: usize,
    local_disconnects: Vec<Address>,
    calls: Vec<LinkCall>,
    /// (service, characteristic) pairs per peer; peers without an entry
    /// expose the standard heart-rate service.
    gatt: HashMap<Address, Vec<(Uuid, Uuid)>>,
    fail_connects: usize,
    fail_subscribes: usize,
    connect_delay: Duration,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<CentralState>,
    events_tx: mpsc::Sender<CentralEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<CentralEvent>>>,
}

impl Shared {
    fn emit(&self, event: CentralEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            tracing::warn!("Mock central dropped event: {}", e);
        }
    }
}

/// Mock BLE central.
///
/// # Examples
///
/// ```
/// use hrbridge_core::{Address, DeviceInfo};
/// use hrbridge_hardware::mock::MockCentral;
/// use hrbridge_hardware::traits::{BleCentral, PeerLink};
/// use hrbridge_hardware::types::CentralEvent;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> hrbridge_hardware::Result<()> {
///     let (central, handle) = MockCentral::new();
///     let mut events = central.take_events().unwrap();
///
///     let monitor = Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
///     handle.add_advertiser(DeviceInfo::new("H10", monitor), -60);
///     central.start_scan(Duration::from_millis(2500)).await?;
///
///     let Some(CentralEvent::Advertisement { device, .. }) = events.recv().await else {
///         panic!("expected an advertisement");
///     };
///     let mut link = central.connect(device.address).await?;
///     link.subscribe_heart_rate().await?;
///     assert!(handle.notify(monitor, vec![0x00, 72]));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockCentral {
    shared: Arc<Shared>,
}

impl MockCentral {
    /// Create a new mock central and its control handle.
    pub fn new() -> (Self, MockCentralHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            state: Mutex::new(CentralState::default()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        });

        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockCentralHandle { shared },
        )
    }
}

impl BleCentral for MockCentral {
    type Link = MockLink;

    async fn start_scan(&self, _window: Duration) -> Result<()> {
        let advertisers = {
            let mut state = self.shared.state.lock();
            state.scanning = true;
            state.scan_starts += 1;
            state.advertisers.clone()
        };
        for (device, rssi) in advertisers {
            self.shared
                .emit(CentralEvent::Advertisement { device, rssi });
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.scanning = false;
        state.scan_stops += 1;
        Ok(())
    }

    async fn connect(&self, address: Address) -> Result<MockLink> {
        let delay = {
            let mut state = self.shared.state.lock();
            state.connect_attempts += 1;
            state.calls.push(LinkCall::Connect(address));
            state.connect_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.shared.state.lock();
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(HardwareError::ble(
                "connect",
                format!("no response from {}", address),
            ));
        }
        state.connected.insert(address);

        Ok(MockLink {
            address,
            shared: Arc::clone(&self.shared),
        })
    }

    fn take_events(&self) -> Option<mpsc::Receiver<CentralEvent>> {
        self.shared.events_rx.lock().take()
    }
}

/// Connection produced by [`MockCentral::connect`].
#[derive(Debug)]
pub struct MockLink {
    address: Address,
    shared: Arc<Shared>,
}

impl PeerLink for MockLink {
    fn address(&self) -> Address {
        self.address
    }

    async fn subscribe(&mut self, service: Uuid, characteristic: Uuid) -> Result<()> {
        let mut state = self.shared.state.lock();
        if !state.connected.contains(&self.address) {
            return Err(HardwareError::NotConnected(self.address));
        }
        let exposed = match state.gatt.get(&self.address) {
            Some(table) => table.contains(&(service, characteristic)),
            None => {
                service == HEART_RATE_SERVICE_UUID && characteristic == HEART_RATE_MEASUREMENT_UUID
            }
        };
        if !exposed {
            return Err(HardwareError::ble(
                "subscribe",
                format!("characteristic {} not found in service {}", characteristic, service),
            ));
        }
        if state.fail_subscribes > 0 {
            state.fail_subscribes -= 1;
            return Err(HardwareError::ble("subscribe", "peer rejected CCCD write"));
        }
        state.subscribed.insert(self.address);
        Ok(())
    }

    async fn disconnect(self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.connected.remove(&self.address);
        state.subscribed.remove(&self.address);
        state.local_disconnects.push(self.address);
        state.calls.push(LinkCall::Disconnect(self.address));
        Ok(())
    }
}

/// Handle for controlling a mock central's environment.
#[derive(Debug, Clone)]
pub struct MockCentralHandle {
    shared: Arc<Shared>,
}

impl MockCentralHandle {
    /// Register an advertiser reported on every scan start.
    ///
    /// If a scan is running the advertisement is reported immediately too.
    pub fn add_advertiser(&self, device: DeviceInfo, rssi: i16) {
        let scanning = {
            let mut state = self.shared.state.lock();
            state.advertisers.push((device.clone(), rssi));
            state.scanning
        };
        if scanning {
            self.shared
                .emit(CentralEvent::Advertisement { device, rssi });
        }
    }

    /// Stop reporting an advertiser.
    pub fn remove_advertiser(&self, address: Address) {
        self.shared
            .state
            .lock()
            .advertisers
            .retain(|(device, _)| device.address != address);
    }

    /// Send a heart-rate notification from a subscribed peer.
    ///
    /// Returns `false` if the peer is not connected and subscribed.
    pub fn notify(&self, address: Address, payload: Vec<u8>) -> bool {
        if !self.shared.state.lock().subscribed.contains(&address) {
            return false;
        }
        self.shared
            .emit(CentralEvent::Notification { address, payload });
        true
    }

    /// Drop the link from the peer's side.
    ///
    /// Returns `false` if the peer was not connected.
    pub fn drop_link(&self, address: Address) -> bool {
        let was_connected = {
            let mut state = self.shared.state.lock();
            state.subscribed.remove(&address);
            state.connected.remove(&address)
        };
        if was_connected {
            self.shared.emit(CentralEvent::Disconnected { address });
        }
        was_connected
    }

    /// Make the next `count` connect attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.shared.state.lock().fail_connects = count;
    }

    /// Make the next `count` subscriptions fail.
    pub fn fail_next_subscribes(&self, count: usize) {
        self.shared.state.lock().fail_subscribes = count;
    }

    /// Replace the GATT table `address` exposes once connected.
    pub fn set_gatt_table(&self, address: Address, table: Vec<(Uuid, Uuid)>) {
        self.shared.state.lock().gatt.insert(address, table);
    }

    /// Time each connect attempt takes.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.shared.state.lock().connect_delay = delay;
    }

    pub fn is_scanning(&self) -> bool {
        self.shared.state.lock().scanning
    }

    pub fn scan_starts(&self) -> usize {
        self.shared.state.lock().scan_starts
    }

    pub fn scan_stops(&self) -> usize {
        self.shared.state.lock().scan_stops
    }

    pub fn connect_attempts(&self) -> usize {
        self.shared.state.lock().connect_attempts
    }

    /// Peers currently connected.
    pub fn connected(&self) -> Vec<Address> {
        self.shared.state.lock().connected.iter().copied().collect()
    }

    /// Peers disconnected by the local side, in order.
    pub fn local_disconnects(&self) -> Vec<Address> {
        self.shared.state.lock().local_disconnects.clone()
    }

    /// Connect and local disconnect calls, in order.
    pub fn calls(&self) -> Vec<LinkCall> {
        self.shared.state.lock().calls.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONITOR: Address = Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    #[tokio::test]
    async fn test_scan_reports_advertisers() {
        let (central, handle) = MockCentral::new();
        let mut events = central.take_events().unwrap();
        assert!(central.take_events().is_none());

        handle.add_advertiser(DeviceInfo::new("H10", MONITOR), -55);
        central.start_scan(Duration::from_secs(1)).await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(CentralEvent::Advertisement {
                device: DeviceInfo::new("H10", MONITOR),
                rssi: -55
            })
        );
        assert!(handle.is_scanning());

        central.stop_scan().await.unwrap();
        assert!(!handle.is_scanning());
        assert_eq!((handle.scan_starts(), handle.scan_stops()), (1, 1));
    }

    #[tokio::test]
    async fn test_advertiser_added_while_scanning() {
        let (central, handle) = MockCentral::new();
        let mut events = central.take_events().unwrap();
        central.start_scan(Duration::from_secs(1)).await.unwrap();

        handle.add_advertiser(DeviceInfo::new("", MONITOR), -70);
        assert!(matches!(
            events.recv().await,
            Some(CentralEvent::Advertisement { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_injection() {
        let (central, handle) = MockCentral::new();
        handle.fail_next_connects(1);

        assert!(central.connect(MONITOR).await.is_err());
        assert!(central.connect(MONITOR).await.is_ok());
        assert_eq!(handle.connect_attempts(), 2);
        assert_eq!(handle.connected(), vec![MONITOR]);
    }

    #[tokio::test]
    async fn test_notify_requires_subscription() {
        let (central, handle) = MockCentral::new();
        let mut link = central.connect(MONITOR).await.unwrap();
        assert!(!handle.notify(MONITOR, vec![0, 60]));

        handle.fail_next_subscribes(1);
        assert!(link.subscribe_heart_rate().await.is_err());
        link.subscribe_heart_rate().await.unwrap();
        assert!(handle.notify(MONITOR, vec![0, 60]));
    }

    #[tokio::test]
    async fn test_remote_and_local_disconnect() {
        let (central, handle) = MockCentral::new();
        let mut events = central.take_events().unwrap();

        let link = central.connect(MONITOR).await.unwrap();
        assert!(handle.drop_link(MONITOR));
        assert_eq!(
            events.recv().await,
            Some(CentralEvent::Disconnected { address: MONITOR })
        );
        assert!(!handle.drop_link(MONITOR));

        link.disconnect().await.unwrap();
        assert_eq!(handle.local_disconnects(), vec![MONITOR]);
        assert!(events.try_recv().is_err());
        assert_eq!(
            handle.calls(),
            vec![LinkCall::Connect(MONITOR), LinkCall::Disconnect(MONITOR)]
        );
    }

    #[tokio::test]
    async fn test_subscribe_resolves_characteristic_by_uuid() {
        let (central, handle) = MockCentral::new();
        let other = Address::new([0x11; 6]);
        // A peer without the heart-rate service
        handle.set_gatt_table(other, vec![(HEART_RATE_SERVICE_UUID, Uuid::nil())]);

        let mut link = central.connect(MONITOR).await.unwrap();
        link.subscribe(HEART_RATE_SERVICE_UUID, HEART_RATE_MEASUREMENT_UUID)
            .await
            .unwrap();
        assert!(
            link.subscribe(HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID)
                .await
                .is_err()
        );

        let mut link = central.connect(other).await.unwrap();
        let err = link.subscribe_heart_rate().await.unwrap_err();
        assert!(err.to_string().contains("00002a37-0000-1000-8000-00805f9b34fb"));
        assert!(!handle.notify(other, vec![0x00, 60]));
    }
}
