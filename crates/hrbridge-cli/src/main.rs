//! Heart-rate bridge running on mock hardware.
//!
//! # Usage
//!
//! ```bash
//! # Idle bridge, in-memory settings
//! hrbridge
//!
//! # Simulated monitor, bridge told to follow it
//! hrbridge --simulate-monitor AA:BB:CC:DD:EE:FF --target AA:BB:CC:DD:EE:FF
//!
//! # Persistent settings and a configuration file
//! hrbridge --config bridge.json --database bridge.db
//! ```

mod simulator;

use anyhow::{Context, Result};
use clap::Parser;
use hrbridge_bridge::{Bridge, BridgeConfig, BridgeHandle};
use hrbridge_core::Address;
use hrbridge_hardware::mock::{
    MockCentral, MockCentralHandle, MockPeripheral, MockPeripheralHandle, MockRadio,
};
use hrbridge_protocol::{WhitelistItem, WhitelistRequest};
use hrbridge_storage::{Database, DatabaseConfig, SettingsRepository};
use simulator::SimulatedMonitor;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// BLE heart-rate to sub-GHz radio bridge
#[derive(Parser, Debug)]
#[command(name = "hrbridge")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite settings database (in-memory if omitted)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run a simulated heart-rate monitor with this address
    #[arg(long)]
    simulate_monitor: Option<Address>,

    /// Advertised name of the simulated monitor
    #[arg(long, default_value = "Polar H10 SIM")]
    monitor_name: String,

    /// Baseline of the simulated heart rate
    #[arg(long, default_value_t = 72)]
    baseline_bpm: u8,

    /// Interval between simulated measurements
    #[arg(long, default_value_t = 1000)]
    sample_interval_ms: u64,

    /// Write this target to the whitelist characteristic after boot
    #[arg(short, long)]
    target: Option<Address>,

    /// Make the first N radio initialisations fail
    #[arg(long, default_value_t = 0)]
    radio_boot_failures: u32,
}

/// Mock environment of one boot.
struct Booted {
    bridge: BridgeHandle<MockRadio>,
    central: MockCentralHandle,
    peripheral: MockPeripheralHandle,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = match &args.config {
        Some(path) => BridgeConfig::from_json_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    let db = match &args.database {
        Some(path) => Database::new(DatabaseConfig::new(path)).await,
        None => Database::in_memory().await,
    }
    .context("Failed to open settings database")?;
    let settings = SettingsRepository::new(db.pool().clone());

    info!("hrbridge v{}", hrbridge_core::VERSION);
    let mut booted = boot(&config, &settings, args.radio_boot_failures).await?;

    let mut simulator = None;
    if let Some(address) = args.simulate_monitor {
        let monitor = SimulatedMonitor::new(
            args.monitor_name.clone(),
            address,
            args.baseline_bpm,
            Duration::from_millis(args.sample_interval_ms),
        );
        info!("Simulating monitor at {}", monitor.address());
        simulator = Some(tokio::spawn(monitor.run(booted.central.clone())));
    }

    if let Some(target) = args.target {
        let value = WhitelistRequest::List(vec![WhitelistItem::Address(target)]).encode()?;
        booted
            .peripheral
            .write_whitelist(value)
            .await
            .context("Failed to write whitelist target")?;
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Shutting down");
        }
        _ = booted.bridge.wait() => {
            warn!("Bridge task ended unexpectedly, shutting down");
        }
    }

    if let Some(task) = simulator {
        task.abort();
    }
    booted.bridge.shutdown().await;
    db.close().await;
    Ok(())
}

/// Boot the bridge, retrying after `restart_delay_ms` while the radio fails
/// to initialise.
async fn boot(
    config: &BridgeConfig,
    settings: &SettingsRepository,
    mut radio_failures: u32,
) -> Result<Booted> {
    loop {
        let (radio, radio_handle) = MockRadio::new();
        let (central, central_handle) = MockCentral::new();
        let (peripheral, peripheral_handle) = MockPeripheral::new();

        if radio_failures > 0 {
            radio_failures -= 1;
            radio_handle.fail_begin(true);
        }

        let bridge = Bridge::new(config.clone(), radio, central, peripheral, settings.clone());
        match bridge.start().await {
            Ok(bridge) => {
                return Ok(Booted {
                    bridge,
                    central: central_handle,
                    peripheral: peripheral_handle,
                });
            }
            Err(e) if e.is_fatal_init() => {
                error!("{}, restarting in {:?}", e, config.restart_delay());
                tokio::time::sleep(config.restart_delay()).await;
            }
            Err(e) => return Err(e).context("Failed to start bridge"),
        }
    }
}
