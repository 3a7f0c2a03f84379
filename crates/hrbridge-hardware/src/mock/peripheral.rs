//! Mock BLE peripheral role (GATT server) for testing and development.

use crate::{Result, traits::BlePeripheral, types::PeripheralEvent};
use hrbridge_core::constants::{
    CANDIDATE_CHAR_UUID, HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID,
    WHITELIST_CHAR_UUID,
};
use hrbridge_core::{Address, DeviceInfo};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Address reported by [`MockPeripheral::new`].
pub const MOCK_PERIPHERAL_ADDRESS: Address = Address::new([0x24, 0x0A, 0xC4, 0x00, 0x00, 0x01]);

/// Characteristics registered under the heart-rate service.
pub const MOCK_GATT_TABLE: [(Uuid, Uuid); 3] = [
    (HEART_RATE_SERVICE_UUID, HEART_RATE_MEASUREMENT_UUID),
    (HEART_RATE_SERVICE_UUID, WHITELIST_CHAR_UUID),
    (HEART_RATE_SERVICE_UUID, CANDIDATE_CHAR_UUID),
];

#[derive(Debug)]
struct PeripheralState {
    advertised_name: Option<String>,
    advertising_starts: usize,
    /// Current value of every registered characteristic.
    values: HashMap<Uuid, Vec<u8>>,
    heart_rate_notifications: Vec<Vec<u8>>,
    candidates: Vec<DeviceInfo>,
}

impl PeripheralState {
    fn new() -> Self {
        Self {
            advertised_name: None,
            advertising_starts: 0,
            values: MOCK_GATT_TABLE
                .iter()
                .map(|(_, characteristic)| (*characteristic, Vec::new()))
                .collect(),
            heart_rate_notifications: Vec::new(),
            candidates: Vec::new(),
        }
    }

    fn write(&mut self, characteristic: Uuid, value: &[u8]) {
        if let Some(current) = self.values.get_mut(&characteristic) {
            *current = value.to_vec();
        }
    }
}

#[derive(Debug)]
struct Shared {
    address: Address,
    state: Mutex<PeripheralState>,
    events_rx: Mutex<Option<mpsc::Receiver<PeripheralEvent>>>,
}

/// Mock GATT server.
///
/// Records everything the bridge publishes; the handle simulates client
/// activity (connections, whitelist writes).
#[derive(Debug, Clone)]
pub struct MockPeripheral {
    shared: Arc<Shared>,
}

impl MockPeripheral {
    /// Create a new mock peripheral and its control handle.
    pub fn new() -> (Self, MockPeripheralHandle) {
        Self::with_address(MOCK_PERIPHERAL_ADDRESS)
    }

    /// Create a mock peripheral reporting `address`.
    pub fn with_address(address: Address) -> (Self, MockPeripheralHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            address,
            state: Mutex::new(PeripheralState::new()),
            events_rx: Mutex::new(Some(events_rx)),
        });

        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockPeripheralHandle { shared, events_tx },
        )
    }
}

impl BlePeripheral for MockPeripheral {
    fn address(&self) -> Address {
        self.shared.address
    }

    async fn start_advertising(&self, name: &str) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.advertised_name = Some(name.to_string());
        state.advertising_starts += 1;
        Ok(())
    }

    async fn notify_heart_rate(&self, payload: &[u8]) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.write(HEART_RATE_MEASUREMENT_UUID, payload);
        state.heart_rate_notifications.push(payload.to_vec());
        Ok(())
    }

    async fn set_whitelist_value(&self, value: &[u8]) -> Result<()> {
        self.shared.state.lock().write(WHITELIST_CHAR_UUID, value);
        Ok(())
    }

    async fn announce_candidate(&self, device: &DeviceInfo) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.write(CANDIDATE_CHAR_UUID, device.name.as_bytes());
        state.candidates.push(device.clone());
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::Receiver<PeripheralEvent>> {
        self.shared.events_rx.lock().take()
    }
}

/// Handle simulating GATT clients of a mock peripheral.
///
/// # Examples
///
/// ```
/// use hrbridge_hardware::mock::MockPeripheral;
/// use hrbridge_hardware::traits::BlePeripheral;
/// use hrbridge_hardware::types::PeripheralEvent;
///
/// #[tokio::main]
/// async fn main() -> hrbridge_hardware::Result<()> {
///     let (peripheral, handle) = MockPeripheral::new();
///     let mut events = peripheral.take_events().unwrap();
///
///     handle.write_whitelist(vec![0x02, 0x00]).await?;
///     assert_eq!(events.recv().await, Some(PeripheralEvent::WhitelistWrite(vec![0x02, 0x00])));
///
///     peripheral.set_whitelist_value(&[0x02, 0x00]).await?;
///     assert_eq!(handle.whitelist_value(), vec![0x02, 0x00]);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockPeripheralHandle {
    shared: Arc<Shared>,
    events_tx: mpsc::Sender<PeripheralEvent>,
}

impl MockPeripheralHandle {
    async fn send(&self, event: PeripheralEvent) -> Result<()> {
        self.events_tx
            .send(event)
            .await
            .map_err(|_| crate::HardwareError::ChannelClosed("peripheral"))
    }

    /// Simulate a client writing the whitelist characteristic.
    pub async fn write_whitelist(&self, value: Vec<u8>) -> Result<()> {
        self.send(PeripheralEvent::WhitelistWrite(value)).await
    }

    /// Simulate a client connecting.
    pub async fn connect_client(&self) -> Result<()> {
        self.send(PeripheralEvent::ClientConnected).await
    }

    /// Simulate a client disconnecting.
    pub async fn disconnect_client(&self) -> Result<()> {
        self.send(PeripheralEvent::ClientDisconnected).await
    }

    /// Simulate an MTU negotiation.
    pub async fn change_mtu(&self, mtu: u16) -> Result<()> {
        self.send(PeripheralEvent::MtuChanged(mtu)).await
    }

    /// Read a characteristic as a client would. `None` if it is not
    /// registered.
    pub fn read(&self, characteristic: Uuid) -> Option<Vec<u8>> {
        self.shared.state.lock().values.get(&characteristic).cloned()
    }

    /// Current value of the whitelist characteristic.
    pub fn whitelist_value(&self) -> Vec<u8> {
        self.read(WHITELIST_CHAR_UUID).unwrap_or_default()
    }

    /// Heart-rate payloads republished so far.
    pub fn heart_rate_notifications(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().heart_rate_notifications.clone()
    }

    /// Candidate devices announced so far.
    pub fn candidates(&self) -> Vec<DeviceInfo> {
        self.shared.state.lock().candidates.clone()
    }

    pub fn advertising_starts(&self) -> usize {
        self.shared.state.lock().advertising_starts
    }

    pub fn advertised_name(&self) -> Option<String> {
        self.shared.state.lock().advertised_name.clone()
    }
}
