//! Control plane of the heart-rate bridge.
//!
//! The bridge follows one BLE heart-rate monitor, forwards its samples over
//! the sub-GHz radio link to peer repeaters and accepts remote configuration
//! through a whitelist characteristic.
//!
//! # Components
//!
//! - [`ConnectionManager`]: owns the upstream connection and its
//!   [`StateMachine`]
//! - [`Dispatcher`]: answers radio frames and encodes samples
//! - [`WhitelistChannel`]: decodes whitelist writes into target changes
//! - [`Bridge`]: composition root wiring everything to the hardware
//!
//! # Data Flow
//!
//! ```text
//!  BleCentral ──events──> ConnectionManager ──samples──> Dispatcher ──> RadioArbiter
//!                               │   ▲                        ▲
//!             notify_heart_rate │   │ set/clear target       │ frames
//!                               ▼   │                        │
//!  BlePeripheral <──────── WhitelistChannel         receive_loop <── IRQ
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hrbridge_bridge::{Bridge, BridgeConfig};
//! use hrbridge_hardware::mock::{MockCentral, MockPeripheral, MockRadio};
//! use hrbridge_storage::{Database, SettingsRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::in_memory().await?;
//! let (radio, _) = MockRadio::new();
//! let (central, _) = MockCentral::new();
//! let (peripheral, _) = MockPeripheral::new();
//!
//! let bridge = Bridge::new(
//!     BridgeConfig::default(),
//!     radio,
//!     central,
//!     peripheral,
//!     SettingsRepository::new(db.pool().clone()),
//! );
//! let handle = bridge.start().await?;
//! println!("Link is {}", handle.connection().status().state);
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod state;
pub mod whitelist;

pub use bridge::{Bridge, BridgeHandle};
pub use config::BridgeConfig;
pub use connection::{ConnectionHandle, ConnectionManager, HeartRateSample, LinkStatus, ScanCycle};
pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherConfig};
pub use error::{BridgeError, Result};
pub use state::{LinkState, StateMachine, StateTransition};
pub use whitelist::{WhitelistAction, WhitelistChannel};
