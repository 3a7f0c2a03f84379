//! Mock LoRa transceiver for testing and development.
//!
//! Packets injected through the handle land in a simulated FIFO and raise the
//! interrupt, exactly like a packet arriving over the air.

use crate::{
    HardwareError, Result,
    traits::RadioDevice,
    types::{RadioConfig, RadioMode},
};
use hrbridge_core::constants::MAX_FRAME_SIZE;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Mock transceiver.
///
/// # Examples
///
/// ```
/// use hrbridge_hardware::mock::MockRadio;
/// use hrbridge_hardware::traits::RadioDevice;
/// use hrbridge_hardware::types::RadioConfig;
///
/// #[tokio::main]
/// async fn main() -> hrbridge_hardware::Result<()> {
///     let (mut radio, handle) = MockRadio::new();
///     radio.begin(&RadioConfig::default()).await?;
///
///     radio.transmit(&[0x63, 0, 72]).await?;
///     assert_eq!(handle.transmitted(), vec![vec![0x63, 0, 72]]);
///
///     handle.inject_packet(vec![0x35, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
///     let mut buf = [0u8; 255];
///     assert_eq!(radio.packet_length().await?, 7);
///     assert_eq!(radio.read_data(&mut buf).await?, 7);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockRadio {
    state: Arc<Mutex<RadioState>>,
    irq: Arc<Notify>,
}

#[derive(Debug, Default)]
struct RadioState {
    mode: RadioMode,
    config: Option<RadioConfig>,
    rx_fifo: VecDeque<Vec<u8>>,
    /// Front packet has been inspected but not read yet.
    inspected: bool,
    transmitted: Vec<Vec<u8>>,
    fail_begin: bool,
    fail_transmits: usize,
    /// Errors returned by the next `read_data` calls, one each.
    read_failures: VecDeque<HardwareError>,
    transmit_delay: Duration,
    standby_calls: usize,
    receive_calls: usize,
}

impl MockRadio {
    /// Create a new mock transceiver and its control handle.
    pub fn new() -> (Self, MockRadioHandle) {
        let state = Arc::new(Mutex::new(RadioState::default()));
        let irq = Arc::new(Notify::new());

        let radio = Self {
            state: Arc::clone(&state),
            irq: Arc::clone(&irq),
        };
        let handle = MockRadioHandle { state, irq };

        (radio, handle)
    }
}

impl RadioDevice for MockRadio {
    async fn begin(&mut self, config: &RadioConfig) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_begin {
            return Err(HardwareError::Code(-2));
        }
        config.validate()?;
        state.config = Some(config.clone());
        state.mode = RadioMode::Standby;
        Ok(())
    }

    async fn transmit(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > MAX_FRAME_SIZE {
            return Err(HardwareError::packet_too_large(data.len(), MAX_FRAME_SIZE));
        }

        let delay = {
            let mut state = self.state.lock();
            if state.config.is_none() {
                return Err(HardwareError::RadioNotStarted);
            }
            state.mode = RadioMode::Transmit;
            state.transmit_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.mode = RadioMode::Standby;
        if state.fail_transmits > 0 {
            state.fail_transmits -= 1;
            return Err(HardwareError::TxTimeout);
        }
        state.transmitted.push(data.to_vec());
        Ok(())
    }

    async fn standby(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.mode = RadioMode::Standby;
        state.standby_calls += 1;
        Ok(())
    }

    async fn start_receive(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.inspected {
            state.rx_fifo.pop_front();
            state.inspected = false;
        }
        state.mode = RadioMode::Receive;
        state.receive_calls += 1;
        Ok(())
    }

    async fn packet_length(&mut self) -> Result<usize> {
        let mut state = self.state.lock();
        let len = state.rx_fifo.front().map_or(0, Vec::len);
        state.inspected = len > 0;
        Ok(len)
    }

    async fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock();
        let packet = state.rx_fifo.pop_front().ok_or(HardwareError::RxTimeout)?;
        state.inspected = false;
        // A failed read still consumes the packet
        if let Some(error) = state.read_failures.pop_front() {
            return Err(error);
        }
        if packet.len() > buf.len() {
            return Err(HardwareError::packet_too_large(packet.len(), buf.len()));
        }
        buf[..packet.len()].copy_from_slice(&packet);
        Ok(packet.len())
    }

    fn interrupt(&self) -> Arc<Notify> {
        Arc::clone(&self.irq)
    }
}

/// Handle for controlling a mock transceiver.
#[derive(Debug, Clone)]
pub struct MockRadioHandle {
    state: Arc<Mutex<RadioState>>,
    irq: Arc<Notify>,
}

impl MockRadioHandle {
    /// Deliver a packet into the FIFO and raise the interrupt.
    pub fn inject_packet(&self, packet: Vec<u8>) {
        self.state.lock().rx_fifo.push_back(packet);
        self.irq.notify_one();
    }

    /// All packets transmitted so far.
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.state.lock().transmitted.clone()
    }

    /// Drain the transmit log.
    pub fn take_transmitted(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state.lock().transmitted)
    }

    /// Make `begin` fail with a driver status code.
    pub fn fail_begin(&self, fail: bool) {
        self.state.lock().fail_begin = fail;
    }

    /// Make the next `count` transmits fail with a transmit timeout.
    pub fn fail_next_transmits(&self, count: usize) {
        self.state.lock().fail_transmits = count;
    }

    /// Make the next read of a pending packet fail with `error`. Calls
    /// queue up, one failure per read.
    pub fn fail_next_reads(&self, error: HardwareError) {
        self.state.lock().read_failures.push_back(error);
    }

    /// Time each transmit spends on air.
    pub fn set_transmit_delay(&self, delay: Duration) {
        self.state.lock().transmit_delay = delay;
    }

    /// Current operating mode.
    pub fn mode(&self) -> RadioMode {
        self.state.lock().mode
    }

    /// Parameters applied by the last successful `begin`.
    pub fn config(&self) -> Option<RadioConfig> {
        self.state.lock().config.clone()
    }

    /// Packets waiting in the FIFO.
    pub fn pending_packets(&self) -> usize {
        self.state.lock().rx_fifo.len()
    }

    /// Number of `standby` calls.
    pub fn standby_calls(&self) -> usize {
        self.state.lock().standby_calls
    }

    /// Number of `start_receive` calls.
    pub fn receive_calls(&self) -> usize {
        self.state.lock().receive_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn started() -> (MockRadio, MockRadioHandle) {
        let (mut radio, handle) = MockRadio::new();
        radio.begin(&RadioConfig::default()).await.unwrap();
        (radio, handle)
    }

    #[tokio::test]
    async fn test_begin_failure() {
        let (mut radio, handle) = MockRadio::new();
        handle.fail_begin(true);
        assert!(matches!(
            radio.begin(&RadioConfig::default()).await,
            Err(HardwareError::Code(-2))
        ));
        assert_eq!(handle.mode(), RadioMode::Sleep);
    }

    #[tokio::test]
    async fn test_transmit_requires_begin() {
        let (mut radio, handle) = MockRadio::new();
        assert!(radio.transmit(&[1, 2, 3]).await.is_err());
        assert!(handle.transmitted().is_empty());
    }

    #[tokio::test]
    async fn test_transmit_failure_injection() {
        let (mut radio, handle) = started().await;
        handle.fail_next_transmits(1);

        assert!(matches!(
            radio.transmit(&[1]).await,
            Err(HardwareError::TxTimeout)
        ));
        radio.transmit(&[2]).await.unwrap();
        assert_eq!(handle.take_transmitted(), vec![vec![2]]);
        assert!(handle.transmitted().is_empty());
    }

    #[tokio::test]
    async fn test_inject_raises_interrupt() {
        let (mut radio, handle) = started().await;
        let irq = radio.interrupt();

        handle.inject_packet(vec![0x36, 4]);
        irq.notified().await;

        let mut buf = [0u8; 8];
        assert_eq!(radio.packet_length().await.unwrap(), 2);
        assert_eq!(radio.read_data(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], &[0x36, 4]);
        assert_eq!(handle.pending_packets(), 0);
    }

    #[tokio::test]
    async fn test_rearm_discards_inspected_packet() {
        let (mut radio, handle) = started().await;
        handle.inject_packet(vec![0xAA; 10]);
        handle.inject_packet(vec![0x36, 1]);

        assert_eq!(radio.packet_length().await.unwrap(), 10);
        radio.start_receive().await.unwrap();

        assert_eq!(handle.pending_packets(), 1);
        assert_eq!(radio.packet_length().await.unwrap(), 2);
        assert_eq!(handle.mode(), RadioMode::Receive);
    }

    #[tokio::test]
    async fn test_read_failure_consumes_packet() {
        let (mut radio, handle) = started().await;
        handle.inject_packet(vec![0x36, 1]);
        handle.inject_packet(vec![0x36, 2]);
        handle.fail_next_reads(HardwareError::CrcMismatch);

        let mut buf = [0u8; 8];
        assert!(matches!(
            radio.read_data(&mut buf).await,
            Err(HardwareError::CrcMismatch)
        ));
        assert_eq!(handle.pending_packets(), 1);
        assert_eq!(radio.read_data(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], &[0x36, 2]);
    }

    #[tokio::test]
    async fn test_read_without_packet() {
        let (mut radio, _handle) = started().await;
        let mut buf = [0u8; 4];
        assert_eq!(radio.packet_length().await.unwrap(), 0);
        assert!(matches!(
            radio.read_data(&mut buf).await,
            Err(HardwareError::RxTimeout)
        ));
    }
}
