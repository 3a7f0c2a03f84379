//! Exclusive access to the half-duplex transceiver.
//!
//! Every operation follows the same discipline: acquire the radio lock
//! within a bounded wait, act, leave the radio listening, release. The lock
//! is a guard, so it is released on every exit path.

use crate::sink::FrameSink;
use bytes::Bytes;
use hrbridge_core::constants::DEFAULT_RADIO_LOCK_TIMEOUT_MS;
use hrbridge_hardware::{HardwareError, RadioConfig, RadioDevice};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, Notify};
use tracing::{debug, error, trace, warn};

/// Lock timeouts used by the arbiter's [`FrameSink`] implementation and the
/// receive task.
///
/// # Example
///
/// ```
/// use hrbridge_link::ArbiterConfig;
/// use std::time::Duration;
///
/// let config = ArbiterConfig {
///     tx_lock_timeout: Duration::from_millis(50),
///     ..Default::default()
/// };
/// assert_eq!(config.rx_lock_timeout, Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbiterConfig {
    /// Bounded wait for the lock before a transmit is dropped.
    pub tx_lock_timeout: Duration,

    /// Bounded wait for the lock before a receive drain is skipped.
    pub rx_lock_timeout: Duration,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            tx_lock_timeout: Duration::from_millis(DEFAULT_RADIO_LOCK_TIMEOUT_MS),
            rx_lock_timeout: Duration::from_millis(DEFAULT_RADIO_LOCK_TIMEOUT_MS),
        }
    }
}

/// Serialises transmit and receive on one radio.
///
/// Cloning is cheap; all clones arbitrate the same device.
///
/// # Example
///
/// ```
/// use hrbridge_hardware::mock::MockRadio;
/// use hrbridge_hardware::RadioConfig;
/// use hrbridge_link::{ArbiterConfig, RadioArbiter};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let (radio, handle) = MockRadio::new();
///     let arbiter = RadioArbiter::new(radio, ArbiterConfig::default());
///     arbiter.begin(&RadioConfig::default()).await.unwrap();
///
///     assert!(arbiter.transmit(&[0x63, 1, 80], Duration::from_millis(100)).await);
///     assert_eq!(handle.transmitted().len(), 1);
/// }
/// ```
pub struct RadioArbiter<R> {
    radio: Arc<Mutex<R>>,
    irq: Arc<Notify>,
    config: ArbiterConfig,
}

impl<R> Clone for RadioArbiter<R> {
    fn clone(&self) -> Self {
        Self {
            radio: Arc::clone(&self.radio),
            irq: Arc::clone(&self.irq),
            config: self.config,
        }
    }
}

impl<R: RadioDevice> RadioArbiter<R> {
    /// Take ownership of a radio.
    pub fn new(radio: R, config: ArbiterConfig) -> Self {
        let irq = radio.interrupt();
        Self {
            radio: Arc::new(Mutex::new(radio)),
            irq,
            config,
        }
    }

    /// Configured lock timeouts.
    pub fn config(&self) -> ArbiterConfig {
        self.config
    }

    /// Packet-received wake signal of the underlying radio.
    pub fn interrupt(&self) -> Arc<Notify> {
        Arc::clone(&self.irq)
    }

    /// Bring the radio up and start listening.
    ///
    /// Waits for the lock without a bound: this runs once at boot before any
    /// other user exists.
    ///
    /// # Errors
    /// Returns the driver error if initialisation fails.
    pub async fn begin(&self, config: &RadioConfig) -> hrbridge_hardware::Result<()> {
        let mut radio = self.radio.lock().await;
        radio.begin(config).await?;
        radio.start_receive().await?;
        debug!(
            "Radio listening at {} MHz, SF{}, {} kHz",
            config.frequency_mhz, config.spreading_factor, config.bandwidth_khz
        );
        Ok(())
    }

    /// Transmit one frame.
    ///
    /// Returns `false` without sending if the lock is not acquired within
    /// `lock_timeout`. Whatever the driver reports, the radio is put back in
    /// standby and then in receive mode before the lock is released.
    pub async fn transmit(&self, frame: &[u8], lock_timeout: Duration) -> bool {
        let Some(mut radio) = self.acquire(lock_timeout).await else {
            warn!(
                "Radio busy for {:?}, dropping {} byte frame",
                lock_timeout,
                frame.len()
            );
            return false;
        };

        let result = radio.transmit(frame).await;
        match &result {
            Ok(()) => trace!("Transmitted {} bytes", frame.len()),
            Err(HardwareError::TxTimeout) => warn!("Transmit timed out"),
            Err(e) => error!("Transmit failed: {}", e),
        }

        Self::rearm(&mut radio).await;
        result.is_ok()
    }

    /// Drain the packet waiting in the radio into `buf`.
    ///
    /// Returns the number of bytes read; zero if the lock was not acquired,
    /// nothing was pending, the packet did not fit `buf`, or the driver
    /// reported an error.
    pub async fn receive(&self, buf: &mut [u8], lock_timeout: Duration) -> usize {
        let Some(mut radio) = self.acquire(lock_timeout).await else {
            warn!("Radio busy for {:?}, skipping receive", lock_timeout);
            return 0;
        };

        let len = match radio.packet_length().await {
            Ok(len) => len,
            Err(e) => {
                warn!("Failed to read packet length: {}", e);
                Self::rearm(&mut radio).await;
                return 0;
            }
        };

        if len > buf.len() {
            warn!(
                "Dropping {} byte packet, buffer holds {} bytes",
                len,
                buf.len()
            );
            Self::rearm(&mut radio).await;
            return 0;
        }

        let read = if len == 0 {
            0
        } else {
            match radio.read_data(&mut buf[..len]).await {
                Ok(read) => read,
                Err(e @ (HardwareError::CrcMismatch | HardwareError::InvalidHeader)) => {
                    warn!("Corrupted packet dropped: {}", e);
                    0
                }
                Err(e) => {
                    warn!("Receive failed: {}", e);
                    0
                }
            }
        };

        Self::rearm(&mut radio).await;
        read
    }

    async fn acquire(&self, lock_timeout: Duration) -> Option<MutexGuard<'_, R>> {
        tokio::time::timeout(lock_timeout, self.radio.lock())
            .await
            .ok()
    }

    async fn rearm(radio: &mut R) {
        if let Err(e) = radio.standby().await {
            warn!("Failed to enter standby: {}", e);
        }
        if let Err(e) = radio.start_receive().await {
            error!("Failed to restart receive: {}", e);
        }
    }
}

impl<R: RadioDevice> FrameSink for RadioArbiter<R> {
    async fn send(&self, frame: Bytes) -> bool {
        self.transmit(&frame, self.config.tx_lock_timeout).await
    }
}
