use crate::arbiter::RadioArbiter;
use bytes::Bytes;
use hrbridge_core::constants::MAX_FRAME_SIZE;
use hrbridge_hardware::RadioDevice;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Interrupt-driven receive task.
///
/// Blocks on the radio's wake signal, drains exactly one packet through the
/// arbiter, forwards it and waits again. Returns when `frames` is closed.
///
/// # Example
///
/// ```
/// use hrbridge_hardware::mock::MockRadio;
/// use hrbridge_hardware::RadioConfig;
/// use hrbridge_link::{ArbiterConfig, RadioArbiter, receive_loop};
/// use tokio::sync::mpsc;
///
/// #[tokio::main]
/// async fn main() {
///     let (radio, handle) = MockRadio::new();
///     let arbiter = RadioArbiter::new(radio, ArbiterConfig::default());
///     arbiter.begin(&RadioConfig::default()).await.unwrap();
///
///     let (tx, mut rx) = mpsc::channel(8);
///     tokio::spawn(receive_loop(arbiter, tx));
///
///     handle.inject_packet(vec![0x36, 5]);
///     assert_eq!(&rx.recv().await.unwrap()[..], &[0x36, 5]);
/// }
/// ```
pub async fn receive_loop<R: RadioDevice>(arbiter: RadioArbiter<R>, frames: mpsc::Sender<Bytes>) {
    let irq = arbiter.interrupt();
    let lock_timeout = arbiter.config().rx_lock_timeout;
    let mut buf = [0u8; MAX_FRAME_SIZE];

    loop {
        irq.notified().await;

        let len = arbiter.receive(&mut buf, lock_timeout).await;
        if len == 0 {
            continue;
        }
        trace!("Received {} byte frame", len);

        if frames.send(Bytes::copy_from_slice(&buf[..len])).await.is_err() {
            debug!("Frame consumer closed, stopping receive task");
            return;
        }
    }
}
