//! Whole-bridge scenarios against mock hardware.

use hrbridge_bridge::{Bridge, BridgeConfig, BridgeHandle, LinkState, LinkStatus};
use hrbridge_core::{Address, DeviceInfo, IdentityKey};
use hrbridge_hardware::mock::{
    MOCK_PERIPHERAL_ADDRESS, MockCentral, MockCentralHandle, MockPeripheral,
    MockPeripheralHandle, MockRadio, MockRadioHandle,
};
use hrbridge_protocol::{
    RadioFrame, RepeaterStatus, WhitelistItem, WhitelistRequest, WhitelistResponse,
};
use hrbridge_storage::{Database, DatabaseConfig, SettingsRepository};
use std::path::Path;
use std::time::Duration;

const MONITOR: Address = Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
const WAIT: Duration = Duration::from_secs(5);

struct Rig {
    bridge: BridgeHandle<MockRadio>,
    radio: MockRadioHandle,
    central: MockCentralHandle,
    peripheral: MockPeripheralHandle,
    settings: SettingsRepository,
}

impl Rig {
    async fn boot(database: &Path) -> Rig {
        let db = Database::new(DatabaseConfig::new(database))
            .await
            .unwrap();
        let settings = SettingsRepository::new(db.pool().clone());

        let (radio, radio_handle) = MockRadio::new();
        let (central, central_handle) = MockCentral::new();
        let (peripheral, peripheral_handle) = MockPeripheral::new();
        central_handle.add_advertiser(DeviceInfo::new("Polar H10 A1B2", MONITOR), -58);

        let bridge = Bridge::new(
            test_config(),
            radio,
            central,
            peripheral,
            settings.clone(),
        )
        .start()
        .await
        .unwrap();

        Rig {
            bridge,
            radio: radio_handle,
            central: central_handle,
            peripheral: peripheral_handle,
            settings,
        }
    }

    async fn wait_for(&self, f: impl Fn(&LinkStatus) -> bool) -> LinkStatus {
        let mut status = self.bridge.connection().subscribe();
        let seen = tokio::time::timeout(WAIT, status.wait_for(|s| f(s)))
            .await
            .expect("timed out waiting for link status")
            .expect("connection manager stopped")
            .clone();
        seen
    }

    async fn wait_for_transmissions(&self, count: usize) -> Vec<Vec<u8>> {
        tokio::time::timeout(WAIT, async {
            loop {
                let sent = self.radio.transmitted();
                if sent.len() >= count {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for radio transmissions")
    }
}

fn test_config() -> BridgeConfig {
    BridgeConfig {
        scan_window_ms: 20,
        scan_period_ms: 50,
        max_reply_jitter_ms: 0,
        named_sample_interval: 3,
        ..Default::default()
    }
}

fn whitelist_target(address: Address) -> Vec<u8> {
    WhitelistRequest::List(vec![WhitelistItem::Address(address)])
        .encode()
        .unwrap()
}

#[tokio::test]
async fn test_boot_whitelist_connect_stream() {
    let dir = tempfile::tempdir().unwrap();
    let rig = Rig::boot(&dir.path().join("bridge.db")).await;
    rig.central.set_connect_delay(Duration::from_millis(150));

    // No persisted address: idle, not scanning
    assert_eq!(rig.bridge.connection().status().state, LinkState::Idle);
    assert_eq!(rig.central.scan_starts(), 0);
    assert_eq!(rig.settings.target_address().await.unwrap(), None);

    rig.peripheral
        .write_whitelist(whitelist_target(MONITOR))
        .await
        .unwrap();
    rig.wait_for(|s| s.state == LinkState::Scanning && s.target == Some(MONITOR))
        .await;

    rig.wait_for(|s| s.state == LinkState::Connecting).await;

    let status = rig.wait_for(|s| s.state == LinkState::Streaming).await;
    assert_eq!(
        status.device,
        Some(DeviceInfo::new("Polar H10 A1B2", MONITOR))
    );
    assert_eq!(rig.settings.target_address().await.unwrap(), Some(MONITOR));
    assert_eq!(rig.central.scan_stops(), 1);

    rig.bridge.shutdown().await;
}

#[tokio::test]
async fn test_samples_reach_radio_and_gatt() {
    let dir = tempfile::tempdir().unwrap();
    let rig = Rig::boot(&dir.path().join("bridge.db")).await;

    rig.peripheral
        .write_whitelist(whitelist_target(MONITOR))
        .await
        .unwrap();
    rig.wait_for(|s| s.state == LinkState::Streaming).await;

    for hr in [70u8, 71, 72] {
        assert!(rig.central.notify(MONITOR, vec![0x00, hr]));
        // Keep samples ordered on the air
        rig.wait_for_transmissions((hr - 69) as usize).await;
    }

    let sent = rig.radio.transmitted();
    assert_eq!(sent[0], vec![0x63, 0, 70]);
    assert_eq!(sent[1], vec![0x63, 0, 71]);
    assert_eq!(
        RadioFrame::decode(&sent[2]).unwrap(),
        RadioFrame::NamedHrData {
            key: IdentityKey::new(0),
            address: MONITOR,
            heart_rate: 72
        }
    );
    assert_eq!(rig.peripheral.heart_rate_notifications().len(), 3);

    rig.bridge.shutdown().await;
}

#[tokio::test]
async fn test_radio_commands_answered() {
    let dir = tempfile::tempdir().unwrap();
    let rig = Rig::boot(&dir.path().join("bridge.db")).await;

    rig.radio.inject_packet(vec![0x36, 17]);
    let sent = rig.wait_for_transmissions(1).await;
    assert_eq!(
        RadioFrame::decode(&sent[0]).unwrap(),
        RadioFrame::RepeaterStatus(RepeaterStatus {
            address: MOCK_PERIPHERAL_ADDRESS,
            key: IdentityKey::new(17),
            device: None,
        })
    );
    assert_eq!(rig.bridge.identity_key(), IdentityKey::new(17));
    assert_eq!(
        rig.settings.identity_key().await.unwrap(),
        Some(IdentityKey::new(17))
    );

    // Query for another repeater: no reply
    let mut query = vec![0x35];
    query.extend_from_slice(MONITOR.as_bytes());
    rig.radio.inject_packet(query);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(rig.radio.transmitted().len(), 1);

    // Broadcast query: reply
    rig.radio.inject_packet(vec![0x35, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    let sent = rig.wait_for_transmissions(2).await;
    assert_eq!(sent[1][0], 0x37);

    rig.bridge.shutdown().await;
}

#[tokio::test]
async fn test_whitelist_request_and_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let rig = Rig::boot(&dir.path().join("bridge.db")).await;

    rig.peripheral.write_whitelist(vec![0x02, 0x00]).await.unwrap();
    tokio::time::timeout(WAIT, async {
        while rig.peripheral.whitelist_value().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(rig.peripheral.whitelist_value(), vec![0x02, 0x00]);

    rig.peripheral
        .write_whitelist(whitelist_target(MONITOR))
        .await
        .unwrap();
    rig.wait_for(|s| s.state == LinkState::Streaming).await;

    rig.peripheral.write_whitelist(vec![0x02, 0x00]).await.unwrap();
    tokio::time::timeout(WAIT, async {
        while rig.peripheral.whitelist_value() == vec![0x02, 0x00] {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(
        WhitelistResponse::decode(&rig.peripheral.whitelist_value()).unwrap(),
        WhitelistResponse::List(vec![WhitelistItem::Address(MONITOR)])
    );

    rig.peripheral.write_whitelist(vec![0x02, 0x01]).await.unwrap();
    rig.wait_for(|s| s.state == LinkState::Idle).await;
    assert_eq!(rig.central.local_disconnects(), vec![MONITOR]);
    assert_eq!(rig.settings.target_address().await.unwrap(), None);

    rig.bridge.shutdown().await;
}

#[tokio::test]
async fn test_gatt_clients_restart_advertising() {
    let dir = tempfile::tempdir().unwrap();
    let rig = Rig::boot(&dir.path().join("bridge.db")).await;
    assert_eq!(rig.peripheral.advertising_starts(), 1);

    rig.peripheral.connect_client().await.unwrap();
    rig.peripheral.change_mtu(185).await.unwrap();
    rig.peripheral.disconnect_client().await.unwrap();

    tokio::time::timeout(WAIT, async {
        while rig.peripheral.advertising_starts() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    rig.bridge.shutdown().await;
}

#[tokio::test]
async fn test_reboot_resumes_persisted_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.db");

    let first = Rig::boot(&path).await;
    first
        .peripheral
        .write_whitelist(whitelist_target(MONITOR))
        .await
        .unwrap();
    first.wait_for(|s| s.state == LinkState::Streaming).await;
    first.bridge.shutdown().await;

    let second = Rig::boot(&path).await;
    let status = second
        .wait_for(|s| s.state == LinkState::Streaming)
        .await;
    assert_eq!(status.target, Some(MONITOR));

    second.bridge.shutdown().await;
}
