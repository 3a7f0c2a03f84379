//! Persistent storage for the heart-rate bridge.
//!
//! The bridge keeps a tiny amount of state across reboots: the address of
//! the monitor it was last streaming from and its identity key. This crate
//! stores both in SQLite through `sqlx`.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool manager with embedded migrations
//! - [`SettingsRepository`] - typed access to the persisted preferences
//!
//! # Failure Policy
//!
//! Storage failures are never fatal to the bridge. Callers log the error and
//! fall back to "no target" and the default identity key.
//!
//! # Example
//!
//! ```no_run
//! use hrbridge_storage::{Database, DatabaseConfig, SettingsRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("hrbridge.db")).await?;
//! let settings = SettingsRepository::new(db.pool().clone());
//!
//! match settings.target_address().await? {
//!     Some(address) => println!("Resuming with {}", address),
//!     None => println!("No target configured"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod settings;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use settings::SettingsRepository;
