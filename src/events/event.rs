//! # Runtime events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Slot lifecycle**: workers spawned, exited, restarted, slots lost
//! - **Data path**: lines dropped or truncated on their way through the pool
//! - **Runtime**: input closed, shutdown, subscriber health
//!
//! The [`Event`] struct carries additional metadata such as timestamps, slot index,
//! process ids, generation, and a reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WorkerRestarted)
//!     .with_slot(1)
//!     .with_pid(4242)
//!     .with_prev_pid(4100)
//!     .with_generation(2);
//!
//! assert_eq!(ev.kind, EventKind::WorkerRestarted);
//! assert_eq!(ev.slot, Some(1));
//! assert_eq!(ev.prev_pid, Some(4100));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Slot lifecycle ===
    /// A slot got its first worker.
    ///
    /// Sets: `slot`, `pid`, `generation` (= 1)
    WorkerSpawned,

    /// A worker process was reaped.
    ///
    /// Sets: `slot`, `pid`, `generation`, `reason` (termination reason)
    WorkerExited,

    /// A terminated slot was populated again in the same pass.
    ///
    /// Sets: `slot`, `pid` (new), `prev_pid`, `generation`
    WorkerRestarted,

    /// Creating a channel or a worker process failed.
    ///
    /// Sets: `slot`, `reason` (error message)
    SpawnFailed,

    /// A slot is permanently dead and no longer polled.
    ///
    /// Sets: `slot`, `prev_pid` (last known pid, if any)
    SlotDead,

    // === Data path ===
    /// An input line could not be delivered to any worker.
    ///
    /// Sets: `slot` (target, if one was chosen), `reason`
    LineDropped,

    /// An oversized line was cut to the configured bound.
    ///
    /// Sets: `slot` (`None` for the supervisor's own input)
    LineTruncated,

    // === Runtime ===
    /// Supervisor input reached end-of-stream; the pool is draining.
    InputClosed,

    /// Shutdown requested (cancellation token or OS signal).
    ShutdownRequested,

    /// The event loop finished: no slot is live anymore.
    PoolStopped,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `subscriber`, `reason` (panic message)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `subscriber`, `reason` (`"full"` or `"closed"`)
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Slot index, if applicable.
    pub slot: Option<usize>,
    /// Current worker process id.
    pub pid: Option<u32>,
    /// Previous worker process id (restarts, dead slots).
    pub prev_pid: Option<u32>,
    /// Slot generation: number of successful spawns so far.
    pub generation: Option<u64>,
    /// Human-readable reason (termination, errors, overflow details).
    pub reason: Option<Arc<str>>,
    /// Subscriber name for subscriber health events.
    pub subscriber: Option<&'static str>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            slot: None,
            pid: None,
            prev_pid: None,
            generation: None,
            reason: None,
            subscriber: None,
        }
    }

    /// Attaches a slot index.
    #[inline]
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Attaches the current process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches the previous process id.
    #[inline]
    pub fn with_prev_pid(mut self, pid: u32) -> Self {
        self.prev_pid = Some(pid);
        self
    }

    /// Attaches the slot generation.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow).with_reason(reason);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// True for events reporting a full subscriber queue.
    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::InputClosed);
        let b = Event::new(EventKind::InputClosed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn subscriber_events_carry_the_name() {
        let ev = Event::subscriber_overflow("log", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.subscriber, Some("log"));
        assert_eq!(ev.reason.as_deref(), Some("full"));
    }
}
