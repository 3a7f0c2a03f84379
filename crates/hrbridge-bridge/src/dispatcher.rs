//! Routing of radio frames and upstream samples.
//!
//! Inbound frames from peer repeaters are decoded and answered; outbound
//! heart-rate samples are encoded and transmitted. Every send goes through a
//! [`FrameSink`], the radio arbiter in production.
//!
//! # Inbound Policy
//!
//! | Frame | Action |
//! |---|---|
//! | `query_device_by_mac` for us or broadcast | jittered `repeater_status` reply |
//! | `query_device_by_mac` for another repeater | ignored |
//! | `set_name_map_key` | store key, immediate `repeater_status` reply |
//! | `hr_data`, `named_hr_data`, `repeater_status` | peer traffic, dropped |
//! | unknown or truncated | logged, dropped |

use crate::connection::{HeartRateSample, LinkStatus};
use hrbridge_core::{
    Address, IdentityKey,
    constants::{DEFAULT_MAX_REPLY_JITTER_MS, DEFAULT_NAMED_SAMPLE_INTERVAL},
};
use hrbridge_link::{FrameSink, SendScheduler};
use hrbridge_protocol::{Magic, RadioFrame, RepeaterStatus};
use hrbridge_storage::SettingsRepository;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Replies to queries are delayed by a uniform random duration in
    /// `0..=max_reply_jitter`.
    pub max_reply_jitter: Duration,

    /// Every Nth sample is sent as `named_hr_data`.
    pub named_sample_interval: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_reply_jitter: Duration::from_millis(DEFAULT_MAX_REPLY_JITTER_MS),
            named_sample_interval: DEFAULT_NAMED_SAMPLE_INTERVAL,
        }
    }
}

/// What [`Dispatcher::dispatch`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A `repeater_status` reply was scheduled after `delay`.
    Scheduled { delay: Duration },
    /// A `repeater_status` reply was transmitted immediately.
    Replied { sent: bool },
    /// A query addressed to another repeater.
    NotAddressed,
    /// Recognised peer traffic with nothing to do.
    Dropped(Magic),
    /// Undecodable frame.
    Invalid,
}

#[derive(Debug, Default)]
struct SampleCounter {
    device: Option<Address>,
    count: u32,
}

impl SampleCounter {
    /// Count one sample, returning whether it is the named one.
    fn tick(&mut self, device: Address, interval: u32) -> bool {
        if self.device != Some(device) {
            self.device = Some(device);
            self.count = 0;
        }
        self.count += 1;
        if self.count >= interval {
            self.count = 0;
            return true;
        }
        false
    }
}

/// Frame router of the bridge.
///
/// All methods take `&self`; the dispatcher is shared between the radio
/// receive path and the sample path.
pub struct Dispatcher<S: FrameSink> {
    sink: Arc<S>,
    scheduler: SendScheduler<S>,
    own_address: Address,
    key: AtomicU8,
    settings: SettingsRepository,
    status: watch::Receiver<LinkStatus>,
    config: DispatcherConfig,
    samples: Mutex<SampleCounter>,
}

impl<S: FrameSink> Dispatcher<S> {
    pub fn new(
        sink: Arc<S>,
        own_address: Address,
        key: IdentityKey,
        settings: SettingsRepository,
        status: watch::Receiver<LinkStatus>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            scheduler: SendScheduler::new(Arc::clone(&sink)),
            sink,
            own_address,
            key: AtomicU8::new(key.as_u8()),
            settings,
            status,
            config,
            samples: Mutex::new(SampleCounter::default()),
        }
    }

    /// Current identity key.
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(self.key.load(Ordering::Acquire))
    }

    pub fn own_address(&self) -> Address {
        self.own_address
    }

    #[cfg(test)]
    fn reply_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// This repeater's identity and the monitor it streams from, if any.
    pub fn repeater_status(&self) -> RepeaterStatus {
        RepeaterStatus {
            address: self.own_address,
            key: self.identity_key(),
            device: self.status.borrow().device.clone(),
        }
    }

    /// Handle one frame received from the radio.
    pub async fn dispatch(&self, data: &[u8]) -> DispatchOutcome {
        let frame = match RadioFrame::decode(data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping radio frame: {}", e);
                return DispatchOutcome::Invalid;
            }
        };

        match frame {
            RadioFrame::QueryDeviceByMac { address } => {
                if !address.targets(&self.own_address) {
                    trace!("Query for {} is not for us", address);
                    return DispatchOutcome::NotAddressed;
                }
                let delay = self.reply_jitter();
                let reply = RadioFrame::RepeaterStatus(self.repeater_status());
                self.scheduler.schedule(reply.encode(), delay);
                debug!("Answering query for {} in {:?}", address, delay);
                DispatchOutcome::Scheduled { delay }
            }
            RadioFrame::SetNameMapKey { key } => {
                self.key.store(key.as_u8(), Ordering::Release);
                info!("Identity key set to {}", key);
                if let Err(e) = self.settings.set_identity_key(key).await {
                    warn!("Failed to persist identity key: {}", e);
                }

                let reply = RadioFrame::RepeaterStatus(self.repeater_status());
                let sent = self.sink.send(reply.encode()).await;
                DispatchOutcome::Replied { sent }
            }
            other => {
                trace!("Ignoring {} from a peer", other);
                DispatchOutcome::Dropped(other.magic())
            }
        }
    }

    /// Frame to transmit for a sample. Advances the named-sample counter.
    pub fn frame_for_sample(&self, sample: HeartRateSample) -> RadioFrame {
        let named = self
            .samples
            .lock()
            .tick(sample.address, self.config.named_sample_interval);
        let key = self.identity_key();

        if named {
            RadioFrame::NamedHrData {
                key,
                address: sample.address,
                heart_rate: sample.heart_rate,
            }
        } else {
            RadioFrame::HrData {
                key,
                heart_rate: sample.heart_rate,
            }
        }
    }

    /// Encode and transmit a sample. Returns whether it went on air.
    pub async fn handle_sample(&self, sample: HeartRateSample) -> bool {
        let frame = self.frame_for_sample(sample);
        trace!("Sending {}", frame);
        self.sink.send(frame.encode()).await
    }

    fn reply_jitter(&self) -> Duration {
        let max = self.config.max_reply_jitter.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}
