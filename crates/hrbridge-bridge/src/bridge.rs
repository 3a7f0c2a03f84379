//! Composition root.
//!
//! [`Bridge::start`] boots the components in dependency order and spawns
//! the long-running tasks:
//!
//! 1. load the persisted target address and identity key
//! 2. bring up the radio (the only fatal step)
//! 3. start advertising the GATT server
//! 4. spawn the connection manager, receive, dispatch and GATT event tasks
//! 5. resume scanning for the persisted target, if any

use crate::config::BridgeConfig;
use crate::connection::{ConnectionHandle, ConnectionManager, HeartRateSample};
use crate::dispatcher::Dispatcher;
use crate::error::{BridgeError, Result};
use crate::whitelist::WhitelistChannel;
use bytes::Bytes;
use hrbridge_core::{Address, IdentityKey};
use hrbridge_hardware::{BleCentral, BlePeripheral, PeripheralEvent, RadioDevice};
use hrbridge_link::{RadioArbiter, receive_loop};
use hrbridge_storage::SettingsRepository;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const FRAME_CHANNEL_CAPACITY: usize = 16;
const SAMPLE_CHANNEL_CAPACITY: usize = 16;

/// Everything the bridge needs before it can start.
pub struct Bridge<R, C, P> {
    config: BridgeConfig,
    radio: R,
    central: C,
    peripheral: P,
    settings: SettingsRepository,
}

impl<R, C, P> Bridge<R, C, P>
where
    R: RadioDevice,
    C: BleCentral,
    P: BlePeripheral,
{
    pub fn new(
        config: BridgeConfig,
        radio: R,
        central: C,
        peripheral: P,
        settings: SettingsRepository,
    ) -> Self {
        Self {
            config,
            radio,
            central,
            peripheral,
            settings,
        }
    }

    /// Boot the bridge.
    ///
    /// # Errors
    ///
    /// - `BridgeError::RadioInit` if the transceiver fails to initialize;
    ///   the caller is expected to restart (see
    ///   [`BridgeError::is_fatal_init`])
    /// - `BridgeError::BleInit` if advertising cannot start
    /// - `BridgeError::EventsTaken` if a BLE event stream was already taken
    pub async fn start(self) -> Result<BridgeHandle<R>> {
        let Self {
            config,
            radio,
            central,
            peripheral,
            settings,
        } = self;

        let (target, key) = load_preferences(&settings).await;

        let arbiter = RadioArbiter::new(radio, config.arbiter());
        arbiter
            .begin(&config.radio)
            .await
            .map_err(BridgeError::RadioInit)?;

        peripheral
            .start_advertising(&config.device_name)
            .await
            .map_err(BridgeError::BleInit)?;
        let central_events = central
            .take_events()
            .ok_or(BridgeError::EventsTaken("BLE central"))?;
        let peripheral_events = peripheral
            .take_events()
            .ok_or(BridgeError::EventsTaken("BLE peripheral"))?;

        let own_address = peripheral.address();
        let (samples_tx, samples_rx) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        let (manager, connection) = ConnectionManager::new(
            central,
            peripheral.clone(),
            settings.clone(),
            config.scan_cycle(),
            samples_tx,
        );
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(arbiter.clone()),
            own_address,
            key,
            settings,
            connection.subscribe(),
            config.dispatcher(),
        ));
        let whitelist = WhitelistChannel::new(connection.clone(), peripheral.clone());

        let mut tasks = JoinSet::new();
        tasks.spawn(manager.run(central_events));
        tasks.spawn(receive_loop(arbiter, frames_tx));
        tasks.spawn(frame_task(Arc::clone(&dispatcher), frames_rx));
        tasks.spawn(sample_task(Arc::clone(&dispatcher), samples_rx));
        tasks.spawn(gatt_task(
            peripheral,
            whitelist,
            peripheral_events,
            config.device_name,
        ));

        info!("Bridge {} up, identity key {}", own_address, key);

        if let Some(address) = target {
            info!("Resuming with persisted target {}", address);
            connection.set_target(address).await;
        }

        Ok(BridgeHandle {
            connection,
            dispatcher,
            tasks,
        })
    }
}

/// Running bridge.
pub struct BridgeHandle<R: RadioDevice> {
    connection: ConnectionHandle,
    dispatcher: Arc<Dispatcher<RadioArbiter<R>>>,
    tasks: JoinSet<()>,
}

impl<R: RadioDevice> BridgeHandle<R> {
    /// Handle to the upstream connection manager.
    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Own address used on the radio link.
    pub fn own_address(&self) -> Address {
        self.dispatcher.own_address()
    }

    /// Current identity key.
    pub fn identity_key(&self) -> IdentityKey {
        self.dispatcher.identity_key()
    }

    /// Wait until any bridge task ends. Returns immediately if none is
    /// running.
    pub async fn wait(&mut self) {
        if let Some(result) = self.tasks.join_next().await {
            match classify_task_result(result) {
                TaskTermination::Panic => error!("Bridge task panicked"),
                _ => warn!("Bridge task exited"),
            }
        }
    }

    /// Abort every task and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.tasks.abort_all();

        let mut panics = 0;
        while let Some(result) = self.tasks.join_next().await {
            if classify_task_result(result) == TaskTermination::Panic {
                panics += 1;
            }
        }

        if panics > 0 {
            warn!("{} bridge task(s) panicked before shutdown", panics);
        }
        info!("Bridge stopped");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskTermination {
    Success,
    Cancelled,
    Panic,
}

fn classify_task_result(
    result: std::result::Result<(), tokio::task::JoinError>,
) -> TaskTermination {
    match result {
        Ok(()) => TaskTermination::Success,
        Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
        Err(_) => TaskTermination::Panic,
    }
}

/// Persisted target and key; unreadable values fall back to absent and the
/// default key.
async fn load_preferences(settings: &SettingsRepository) -> (Option<Address>, IdentityKey) {
    let target = match settings.target_address().await {
        Ok(Some(address)) => Some(address),
        Ok(None) => {
            info!("No persisted target address, staying idle");
            None
        }
        Err(e) => {
            warn!("Failed to load target address, staying idle: {}", e);
            None
        }
    };

    let key = match settings.identity_key().await {
        Ok(Some(key)) => key,
        Ok(None) => {
            info!("No persisted identity key, using {}", IdentityKey::default());
            IdentityKey::default()
        }
        Err(e) => {
            warn!("Failed to load identity key, using default: {}", e);
            IdentityKey::default()
        }
    };

    (target, key)
}

async fn frame_task<R: RadioDevice>(
    dispatcher: Arc<Dispatcher<RadioArbiter<R>>>,
    mut frames: mpsc::Receiver<Bytes>,
) {
    while let Some(frame) = frames.recv().await {
        let outcome = dispatcher.dispatch(&frame).await;
        debug!("Dispatched {} byte frame: {:?}", frame.len(), outcome);
    }
}

async fn sample_task<R: RadioDevice>(
    dispatcher: Arc<Dispatcher<RadioArbiter<R>>>,
    mut samples: mpsc::Receiver<HeartRateSample>,
) {
    while let Some(sample) = samples.recv().await {
        dispatcher.handle_sample(sample).await;
    }
}

async fn gatt_task<P: BlePeripheral>(
    peripheral: P,
    whitelist: WhitelistChannel<P>,
    mut events: mpsc::Receiver<PeripheralEvent>,
    device_name: String,
) {
    while let Some(event) = events.recv().await {
        match event {
            PeripheralEvent::WhitelistWrite(value) => {
                let action = whitelist.on_write(&value).await;
                debug!("Whitelist write handled: {:?}", action);
            }
            PeripheralEvent::ClientConnected | PeripheralEvent::ClientDisconnected => {
                info!("GATT client {:?}, restarting advertising", event);
                if let Err(e) = peripheral.start_advertising(&device_name).await {
                    warn!("Failed to restart advertising: {}", e);
                }
            }
            PeripheralEvent::MtuChanged(mtu) => debug!("MTU changed to {}", mtu),
        }
    }
    debug!("GATT event stream closed");
}
