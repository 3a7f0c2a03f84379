//! Radio link layer of the heart-rate bridge.
//!
//! The sub-GHz transceiver is half-duplex and shared by everything that
//! talks over the air. This crate owns it:
//!
//! - [`RadioArbiter`]: serialises transmit and receive behind a lock acquired
//!   with a bounded wait
//! - [`receive_loop`]: interrupt-woken task draining one packet per wake
//! - [`SendScheduler`]: single-slot delayed send used to jitter replies
//! - [`FrameSink`]: the "send these bytes" seam the upper layers depend on
//!
//! # Architecture
//!
//! ```text
//!  Dispatcher ──> SendScheduler ──┐
//!      │                          ├──> FrameSink (RadioArbiter) ──> RadioDevice
//!      └──────────────────────────┘            ▲
//!                                              │ lock
//!  IRQ ──> receive_loop ──────────────────────-┘
//!              │
//!              └──> mpsc<Bytes> ──> Dispatcher
//! ```
//!
//! # Failure Policy
//!
//! Nothing here returns an error to the caller once the radio is running: a
//! lock timeout or driver failure is logged and reported as `false` / zero
//! bytes. Best-effort delivery is the contract of the link.

mod arbiter;
mod receiver;
mod scheduler;
mod sink;

pub use arbiter::{ArbiterConfig, RadioArbiter};
pub use receiver::receive_loop;
pub use scheduler::SendScheduler;
pub use sink::FrameSink;
