//! Upstream connection manager.
//!
//! A single task owns everything about the upstream monitor: the target
//! address, the live connection, the scan cycle and the [`StateMachine`].
//! Other contexts talk to it through a [`ConnectionHandle`] and observe it
//! through a [`LinkStatus`] snapshot published on a `watch` channel.
//!
//! Connect attempts run as transient tasks. Each attempt is tagged with the
//! target epoch it was started for; when its outcome arrives after the target
//! changed, the link is disconnected and discarded.
//!
//! # Example
//!
//! ```no_run
//! use hrbridge_bridge::connection::{ConnectionManager, ScanCycle};
//! use hrbridge_bridge::LinkState;
//! use hrbridge_core::Address;
//! use hrbridge_hardware::mock::{MockCentral, MockPeripheral};
//! use hrbridge_hardware::BleCentral;
//! use hrbridge_storage::{Database, SettingsRepository};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (central, _) = MockCentral::new();
//! let (peripheral, _) = MockPeripheral::new();
//! let db = Database::in_memory().await?;
//! let (samples_tx, _samples) = mpsc::channel(16);
//!
//! let events = central.take_events().ok_or("events taken")?;
//! let (manager, handle) = ConnectionManager::new(
//!     central,
//!     peripheral,
//!     SettingsRepository::new(db.pool().clone()),
//!     ScanCycle::default(),
//!     samples_tx,
//! );
//! tokio::spawn(manager.run(events));
//!
//! handle.set_target("AA:BB:CC:DD:EE:FF".parse::<Address>()?).await;
//! handle.wait_for_state(LinkState::Streaming).await;
//! # Ok(())
//! # }
//! ```

use crate::state::{LinkState, StateMachine, StateTransition};
use hrbridge_core::{
    Address, DeviceInfo,
    constants::{DEFAULT_SCAN_PERIOD_MS, DEFAULT_SCAN_WINDOW_MS},
};
use hrbridge_hardware::{BleCentral, BlePeripheral, CentralEvent, PeerLink};
use hrbridge_protocol::parse_heart_rate;
use hrbridge_storage::SettingsRepository;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

const COMMAND_CHANNEL_CAPACITY: usize = 16;
const OUTCOME_CHANNEL_CAPACITY: usize = 4;

/// Timing of the discovery loop: an active scan of `window`, repeated every
/// `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCycle {
    pub window: Duration,
    pub period: Duration,
}

impl Default for ScanCycle {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(DEFAULT_SCAN_WINDOW_MS),
            period: Duration::from_millis(DEFAULT_SCAN_PERIOD_MS),
        }
    }
}

/// Snapshot of the upstream link, republished on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub state: LinkState,
    pub target: Option<Address>,
    /// The connected monitor, set only while `Streaming`.
    pub device: Option<DeviceInfo>,
}

/// A decoded heart-rate value from the connected monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartRateSample {
    pub address: Address,
    pub heart_rate: u8,
}

#[derive(Debug)]
enum Command {
    SetTarget(Option<Address>),
    QueryTarget(oneshot::Sender<Option<Address>>),
    QueryTransitions {
        count: usize,
        reply: oneshot::Sender<Vec<StateTransition>>,
    },
}

struct ConnectedDevice<L> {
    info: DeviceInfo,
    link: L,
}

struct ConnectOutcome<L> {
    epoch: u64,
    device: DeviceInfo,
    result: hrbridge_hardware::Result<L>,
}

/// Cloneable handle to a running [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<LinkStatus>,
}

impl ConnectionHandle {
    /// Point the bridge at a new monitor. Any connected device is
    /// disconnected before scanning for the new one.
    ///
    /// Returns `false` if the manager has stopped.
    pub async fn set_target(&self, address: Address) -> bool {
        self.send(Command::SetTarget(Some(address))).await
    }

    /// Drop the target and any connection, returning to `Idle`.
    pub async fn clear_target(&self) -> bool {
        self.send(Command::SetTarget(None)).await
    }

    /// Current target address as seen by the owning task.
    pub async fn target(&self) -> Option<Address> {
        let (reply, response) = oneshot::channel();
        if !self.send(Command::QueryTarget(reply)).await {
            return None;
        }
        response.await.ok().flatten()
    }

    /// Up to `count` most recent link state transitions, oldest first.
    /// Empty if the manager has stopped.
    pub async fn recent_transitions(&self, count: usize) -> Vec<StateTransition> {
        let (reply, response) = oneshot::channel();
        if !self.send(Command::QueryTransitions { count, reply }).await {
            return Vec::new();
        }
        response.await.unwrap_or_default()
    }

    /// Latest published status.
    pub fn status(&self) -> LinkStatus {
        self.status.borrow().clone()
    }

    /// Receiver for status changes.
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    /// Wait until the link reaches `state`. Returns `false` if the manager
    /// stopped first.
    pub async fn wait_for_state(&self, state: LinkState) -> bool {
        let mut status = self.status.clone();
        status.wait_for(|s| s.state == state).await.is_ok()
    }

    async fn send(&self, command: Command) -> bool {
        if self.commands.send(command).await.is_err() {
            warn!("Connection manager is not running");
            return false;
        }
        true
    }
}

/// Owner of the upstream connection lifecycle.
pub struct ConnectionManager<C: BleCentral, P: BlePeripheral> {
    central: C,
    peripheral: P,
    settings: SettingsRepository,
    cycle: ScanCycle,
    machine: StateMachine,
    target: Option<Address>,
    /// Bumped on every target change.
    target_epoch: u64,
    device: Option<ConnectedDevice<C::Link>>,
    /// Epoch of the connect attempt in flight.
    attempt: Option<u64>,
    scan_task: Option<JoinHandle<()>>,
    /// Named devices already announced in the current scan session.
    announced: HashSet<Address>,
    commands: mpsc::Receiver<Command>,
    status: watch::Sender<LinkStatus>,
    samples: mpsc::Sender<HeartRateSample>,
}

impl<C: BleCentral, P: BlePeripheral> ConnectionManager<C, P> {
    /// Create the manager and its handle. Nothing happens until
    /// [`run`](Self::run) is spawned.
    pub fn new(
        central: C,
        peripheral: P,
        settings: SettingsRepository,
        cycle: ScanCycle,
        samples: mpsc::Sender<HeartRateSample>,
    ) -> (Self, ConnectionHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (status, status_rx) = watch::channel(LinkStatus::default());

        let manager = Self {
            central,
            peripheral,
            settings,
            cycle,
            machine: StateMachine::new(),
            target: None,
            target_epoch: 0,
            device: None,
            attempt: None,
            scan_task: None,
            announced: HashSet::new(),
            commands,
            status,
            samples,
        };
        let handle = ConnectionHandle {
            commands: commands_tx,
            status: status_rx,
        };
        (manager, handle)
    }

    /// Process commands, central events and connect outcomes until every
    /// handle is dropped or the central event stream ends.
    pub async fn run(mut self, mut events: mpsc::Receiver<CentralEvent>) {
        let (outcome_tx, mut outcomes) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);
        debug!("Connection manager started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All connection handles dropped");
                        break;
                    };
                    self.handle_command(command).await;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        warn!("BLE central event stream closed");
                        break;
                    };
                    self.handle_event(event, &outcome_tx).await;
                }
                Some(outcome) = outcomes.recv() => {
                    self.handle_outcome(outcome).await;
                }
            }
        }

        self.stop_scanning().await;
        self.disconnect_device().await;
        debug!("Connection manager stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetTarget(target) => self.set_target(target).await,
            Command::QueryTarget(reply) => {
                let _ = reply.send(self.target);
            }
            Command::QueryTransitions { count, reply } => {
                let _ = reply.send(self.machine.recent(count));
            }
        }
    }

    async fn set_target(&mut self, target: Option<Address>) {
        if target == self.target {
            debug!("Target unchanged");
            return;
        }

        self.target = target;
        self.target_epoch += 1;

        // The old device goes before anything is attempted for the new target
        self.disconnect_device().await;

        match target {
            Some(address) => {
                info!("Target set to {}", address);
                self.enter(LinkState::Scanning);
                self.start_scanning();
            }
            None => {
                info!("Target cleared");
                self.stop_scanning().await;
                self.enter(LinkState::Idle);
                if let Err(e) = self.settings.clear_target_address().await {
                    warn!("Failed to clear persisted target address: {}", e);
                }
            }
        }

        self.publish();
    }

    async fn handle_event(
        &mut self,
        event: CentralEvent,
        outcome_tx: &mpsc::Sender<ConnectOutcome<C::Link>>,
    ) {
        match event {
            CentralEvent::Advertisement { device, rssi } => {
                self.on_advertisement(device, rssi, outcome_tx).await
            }
            CentralEvent::Notification { address, payload } => {
                self.on_notification(address, payload).await
            }
            CentralEvent::Disconnected { address } => self.on_disconnected(address),
        }
    }

    async fn on_advertisement(
        &mut self,
        device: DeviceInfo,
        rssi: i16,
        outcome_tx: &mpsc::Sender<ConnectOutcome<C::Link>>,
    ) {
        if !device.name.is_empty()
            && self.announced.insert(device.address)
            && let Err(e) = self.peripheral.announce_candidate(&device).await
        {
            warn!("Failed to announce {}: {}", device, e);
        }

        if self.target != Some(device.address) {
            trace!("Ignoring advertisement from {}", device);
            return;
        }
        if self.device.is_some() || self.attempt.is_some() {
            trace!("Already connected or connecting to {}", device.address);
            return;
        }
        if *self.machine.current_state() != LinkState::Scanning {
            return;
        }

        info!("Found {} (RSSI {} dBm), connecting", device, rssi);
        self.enter(LinkState::Connecting);
        self.publish();

        let epoch = self.target_epoch;
        self.attempt = Some(epoch);

        let central = self.central.clone();
        let outcome_tx = outcome_tx.clone();
        tokio::spawn(async move {
            let result = connect_and_subscribe(&central, device.address).await;
            let outcome = ConnectOutcome {
                epoch,
                device,
                result,
            };
            if let Err(mpsc::error::SendError(outcome)) = outcome_tx.send(outcome).await
                && let Ok(link) = outcome.result
            {
                // Manager is gone
                let _ = link.disconnect().await;
            }
        });
    }

    async fn handle_outcome(&mut self, outcome: ConnectOutcome<C::Link>) {
        self.attempt = None;
        let ConnectOutcome {
            epoch,
            device,
            result,
        } = outcome;
        let stale = epoch != self.target_epoch;

        match result {
            Ok(link) if stale => {
                debug!("Target changed while connecting, dropping {}", device);
                if let Err(e) = link.disconnect().await {
                    warn!("Failed to disconnect {}: {}", device, e);
                }
            }
            Err(e) if stale => {
                debug!("Stale connect attempt to {} failed: {}", device, e);
            }
            Ok(link) => {
                self.stop_scanning().await;
                self.enter(LinkState::Streaming);
                info!("Streaming heart rate from {}", device);

                if let Err(e) = self.settings.set_target_address(device.address).await {
                    warn!("Failed to persist target address: {}", e);
                }
                self.device = Some(ConnectedDevice { info: device, link });
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", device, e);
                self.enter(LinkState::Scanning);
                self.start_scanning();
            }
        }

        self.publish();
    }

    async fn on_notification(&mut self, address: Address, payload: Vec<u8>) {
        match &self.device {
            Some(device) if device.info.address == address => {}
            _ => {
                trace!("Notification from unbound device {}", address);
                return;
            }
        }

        if let Err(e) = self.peripheral.notify_heart_rate(&payload).await {
            warn!("Failed to republish heart rate: {}", e);
        }

        match parse_heart_rate(&payload) {
            Ok(heart_rate) => {
                let sample = HeartRateSample {
                    address,
                    heart_rate,
                };
                if let Err(e) = self.samples.try_send(sample) {
                    warn!("Dropping heart-rate sample: {}", e);
                }
            }
            Err(e) => warn!("Discarding notification from {}: {}", address, e),
        }
    }

    fn on_disconnected(&mut self, address: Address) {
        let Some(device) = self.device.take_if(|d| d.info.address == address) else {
            debug!("Disconnect from unbound device {}", address);
            return;
        };
        // Link is already down on the remote side
        drop(device.link);
        warn!("{} disconnected", device.info);

        if self.target.is_some() {
            self.enter(LinkState::Scanning);
            self.start_scanning();
        } else {
            self.enter(LinkState::Idle);
        }
        self.publish();
    }

    fn start_scanning(&mut self) {
        if self.scan_task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        debug!(
            "Scanning {:?} every {:?}",
            self.cycle.window, self.cycle.period
        );
        self.announced.clear();
        self.scan_task = Some(tokio::spawn(scan_cycle(self.central.clone(), self.cycle)));
    }

    async fn stop_scanning(&mut self) {
        let Some(task) = self.scan_task.take() else {
            return;
        };
        task.abort();
        if let Err(e) = self.central.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
    }

    async fn disconnect_device(&mut self) {
        let Some(device) = self.device.take() else {
            return;
        };
        info!("Disconnecting {}", device.info);
        if let Err(e) = device.link.disconnect().await {
            warn!("Failed to disconnect {}: {}", device.info, e);
        }
    }

    fn enter(&mut self, state: LinkState) {
        if *self.machine.current_state() == state {
            return;
        }
        match self.machine.transition_to(state) {
            Ok(transition) => debug!("Link {}", transition),
            Err(e) => error!("{}", e),
        }
    }

    fn publish(&self) {
        let status = LinkStatus {
            state: *self.machine.current_state(),
            target: self.target,
            device: self.device.as_ref().map(|d| d.info.clone()),
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }
}

async fn connect_and_subscribe<C: BleCentral>(
    central: &C,
    address: Address,
) -> hrbridge_hardware::Result<C::Link> {
    let mut link = central.connect(address).await?;
    if let Err(e) = link.subscribe_heart_rate().await {
        if let Err(disconnect_err) = link.disconnect().await {
            warn!("Failed to disconnect {}: {}", address, disconnect_err);
        }
        return Err(e);
    }
    Ok(link)
}

async fn scan_cycle<C: BleCentral>(central: C, cycle: ScanCycle) {
    loop {
        if let Err(e) = central.start_scan(cycle.window).await {
            warn!("Failed to start scan: {}", e);
        }
        tokio::time::sleep(cycle.period).await;
    }
}
