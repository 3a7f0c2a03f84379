//! Simulated heart-rate monitor.
//!
//! Registers an advertiser in the mock radio environment and, once the
//! bridge has subscribed, emits a measurement every tick. The value follows
//! a bounded random walk around a baseline.

use hrbridge_core::{Address, DeviceInfo};
use hrbridge_hardware::mock::MockCentralHandle;
use rand::Rng;
use std::time::Duration;
use tracing::{info, trace};

const MIN_HEART_RATE: u8 = 40;
const MAX_HEART_RATE: u8 = 200;
const MAX_DRIFT: u8 = 20;
const RSSI: i16 = -61;

#[derive(Debug, Clone)]
pub struct SimulatedMonitor {
    device: DeviceInfo,
    baseline: u8,
    interval: Duration,
}

impl SimulatedMonitor {
    pub fn new(name: impl Into<String>, address: Address, baseline: u8, interval: Duration) -> Self {
        Self {
            device: DeviceInfo::new(name, address),
            baseline: baseline.clamp(MIN_HEART_RATE, MAX_HEART_RATE),
            interval,
        }
    }

    pub fn address(&self) -> Address {
        self.device.address
    }

    /// Advertise and stream until the task is dropped.
    pub async fn run(self, central: MockCentralHandle) {
        info!("Simulated monitor {} advertising", self.device);
        central.add_advertiser(self.device.clone(), RSSI);

        let mut ticker = tokio::time::interval(self.interval);
        let mut heart_rate = self.baseline;
        loop {
            ticker.tick().await;
            heart_rate = next_heart_rate(&mut rand::thread_rng(), heart_rate, self.baseline);
            if central.notify(self.device.address, measurement(heart_rate)) {
                trace!("Simulated monitor sent {} bpm", heart_rate);
            }
        }
    }
}

/// One step of the random walk, kept within `MAX_DRIFT` of the baseline.
fn next_heart_rate(rng: &mut impl Rng, current: u8, baseline: u8) -> u8 {
    let low = baseline.saturating_sub(MAX_DRIFT).max(MIN_HEART_RATE);
    let high = baseline.saturating_add(MAX_DRIFT).min(MAX_HEART_RATE);
    let step: i16 = rng.gen_range(-2..=2);
    (current as i16 + step).clamp(low as i16, high as i16) as u8
}

/// Heart Rate Measurement payload with the 8-bit value format.
fn measurement(heart_rate: u8) -> Vec<u8> {
    vec![0x00, heart_rate]
}
