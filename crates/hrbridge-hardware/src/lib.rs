//! Hardware abstraction layer for the heart-rate bridge.
//!
//! This crate defines the boundary between the bridge's control plane and
//! the platform it runs on. Three collaborators are abstracted:
//!
//! - [`RadioDevice`]: the half-duplex sub-GHz LoRa transceiver
//! - [`BleCentral`] / [`PeerLink`]: the BLE central role connecting to the
//!   upstream heart-rate monitor
//! - [`BlePeripheral`]: the GATT server exposing heart rate, whitelist and
//!   candidate characteristics
//!
//! # Design Philosophy
//!
//! - **Async-first**: all I/O is asynchronous using `impl Future + Send`
//!   return types (Rust 1.90 + Edition 2024 RPITIT).
//! - **Thread-safe**: collaborators are `Send`, BLE handles are cheaply
//!   cloneable and shared between tasks.
//! - **Event-driven**: the BLE roles report asynchronous activity through
//!   event channels taken once by their owner.
//!
//! # Example
//!
//! ```no_run
//! use hrbridge_hardware::traits::{BleCentral, PeerLink};
//! use hrbridge_core::Address;
//! use hrbridge_hardware::error::Result;
//!
//! async fn attach<C: BleCentral>(central: &C, address: Address) -> Result<C::Link> {
//!     let mut link = central.connect(address).await?;
//!     if let Err(e) = link.subscribe_heart_rate().await {
//!         link.disconnect().await.ok();
//!         return Err(e);
//!     }
//!     Ok(link)
//! }
//! ```
//!
//! # Mock Implementations
//!
//! The [`mock`] module provides simulated devices with control handles for
//! tests and the host simulator.

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use traits::{BleCentral, BlePeripheral, PeerLink, RadioDevice};
pub use types::{CentralEvent, PeripheralEvent, RadioConfig, RadioMode};
