//! Single-slot delayed send.
//!
//! Scheduling replaces whatever is pending: the previous timer is aborted and
//! its frame discarded. Bursts of identical broadcast queries therefore
//! collapse into one reply sent after the last requested delay.

use crate::sink::FrameSink;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct PendingSend {
    generation: u64,
    fire_at: Instant,
    timer: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Slot {
    next_generation: u64,
    pending: Option<PendingSend>,
}

/// Coalescing scheduler holding at most one delayed frame.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use hrbridge_link::{FrameSink, SendScheduler};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Log(Mutex<Vec<Bytes>>);
///
/// impl FrameSink for Log {
///     async fn send(&self, frame: Bytes) -> bool {
///         self.0.lock().unwrap().push(frame);
///         true
///     }
/// }
///
/// #[tokio::main(flavor = "current_thread", start_paused = true)]
/// async fn main() {
///     let log = Arc::new(Log::default());
///     let scheduler = SendScheduler::new(Arc::clone(&log));
///
///     scheduler.schedule(Bytes::from_static(b"A"), Duration::from_millis(500));
///     scheduler.schedule(Bytes::from_static(b"B"), Duration::from_millis(500));
///     tokio::time::sleep(Duration::from_secs(1)).await;
///
///     assert_eq!(*log.0.lock().unwrap(), vec![Bytes::from_static(b"B")]);
/// }
/// ```
pub struct SendScheduler<S> {
    sink: Arc<S>,
    slot: Arc<Mutex<Slot>>,
}

impl<S: FrameSink> SendScheduler<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self {
            sink,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Send `frame` after `delay`, replacing any pending frame.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, frame: Bytes, delay: Duration) {
        let mut slot = self.slot.lock();

        if let Some(previous) = slot.pending.take() {
            previous.timer.abort();
            debug!("Replaced pending send due at {:?}", previous.fire_at);
        }

        slot.next_generation += 1;
        let generation = slot.next_generation;
        let fire_at = Instant::now() + delay;

        let sink = Arc::clone(&self.sink);
        let timer_slot = Arc::clone(&self.slot);
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;

            // Claim the slot; a replacement may have raced with this wakeup
            {
                let mut slot = timer_slot.lock();
                match &slot.pending {
                    Some(pending) if pending.generation == generation => slot.pending = None,
                    _ => return,
                }
            }

            if !sink.send(frame).await {
                debug!("Scheduled frame was not sent");
            }
        });

        slot.pending = Some(PendingSend {
            generation,
            fire_at,
            timer,
        });
    }

    /// Whether a frame is waiting for its timer.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    #[cfg(test)]
    fn deadline(&self) -> Option<Instant> {
        self.slot.lock().pending.as_ref().map(|pending| pending.fire_at)
    }
}

impl<S> SendScheduler<S> {
    /// Drop the pending frame, if any. Returns whether one was pending.
    fn cancel(&self) -> bool {
        match self.slot.lock().pending.take() {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }
}

impl<S> Drop for SendScheduler<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(Instant, Bytes)>>,
    }

    impl FrameSink for RecordingSink {
        async fn send(&self, frame: Bytes) -> bool {
            self.sent.lock().push((Instant::now(), frame));
            true
        }
    }

    fn assert_fired_at(actual: Instant, expected: Instant) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(5),
            "fired at {:?}, expected {:?}",
            actual,
            expected
        );
    }

    fn scheduler() -> (SendScheduler<RecordingSink>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (SendScheduler::new(Arc::clone(&sink)), sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let (scheduler, sink) = scheduler();
        let start = Instant::now();

        scheduler.schedule(Bytes::from_static(&[1]), Duration::from_millis(300));
        assert!(scheduler.is_pending());
        assert_eq!(
            scheduler.deadline(),
            Some(start + Duration::from_millis(300))
        );

        tokio::time::sleep(Duration::from_secs(2)).await;

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_fired_at(sent[0].0, start + Duration::from_millis(300));
        assert!(!scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_discards_previous() {
        let (scheduler, sink) = scheduler();
        let start = Instant::now();

        scheduler.schedule(Bytes::from_static(b"A"), Duration::from_millis(1000));
        tokio::time::sleep(Duration::from_millis(400)).await;
        scheduler.schedule(Bytes::from_static(b"B"), Duration::from_millis(1000));

        tokio::time::sleep(Duration::from_secs(3)).await;

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, Bytes::from_static(b"B"));
        assert_fired_at(sent[0].0, start + Duration::from_millis(1400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_one_send() {
        let (scheduler, sink) = scheduler();
        for i in 0..10u8 {
            scheduler.schedule(Bytes::copy_from_slice(&[i]), Duration::from_millis(50));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, Bytes::from_static(&[9]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let (scheduler, sink) = scheduler();
        scheduler.schedule(Bytes::from_static(&[1]), Duration::from_millis(100));

        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(sink.sent.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay() {
        let (scheduler, sink) = scheduler();
        scheduler.schedule(Bytes::from_static(&[7]), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(sink.sent.lock().len(), 1);
    }
}
