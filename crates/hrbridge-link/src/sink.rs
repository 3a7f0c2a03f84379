use bytes::Bytes;
use std::future::Future;

/// Destination for encoded radio frames.
///
/// Sending is best-effort: the result only tells whether the frame went on
/// air, failures are logged by the implementation.
pub trait FrameSink: Send + Sync + 'static {
    /// Send one encoded frame.
    fn send(&self, frame: Bytes) -> impl Future<Output = bool> + Send;
}
