//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to **stderr**, leaving
//! stdout to relayed worker output.
//!
//! ## Example output
//! ```text
//! [spawned] slot=0 pid=4100 generation=1
//! [exited] slot=1 pid=4101 reason="killed by SIGABRT"
//! [restarted] slot=1 pid=4133 prev_pid=4101 generation=2
//! [spawn-failed] slot=0 err="resources exhausted while creating channel: ..."
//! [slot-dead] slot=0
//! [input-closed]
//! [pool-stopped]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Formats one event as a log line.
pub(crate) fn render(e: &Event) -> String {
    let slot = e.slot.map_or_else(|| "-".to_string(), |s| s.to_string());
    let reason = e.reason.as_deref().unwrap_or("unknown");
    match e.kind {
        EventKind::WorkerSpawned => format!(
            "[spawned] slot={slot} pid={} generation={}",
            e.pid.unwrap_or_default(),
            e.generation.unwrap_or_default()
        ),
        EventKind::WorkerExited => format!(
            "[exited] slot={slot} pid={} reason={reason:?}",
            e.pid.unwrap_or_default()
        ),
        EventKind::WorkerRestarted => format!(
            "[restarted] slot={slot} pid={} prev_pid={} generation={}",
            e.pid.unwrap_or_default(),
            e.prev_pid.unwrap_or_default(),
            e.generation.unwrap_or_default()
        ),
        EventKind::SpawnFailed => format!("[spawn-failed] slot={slot} err={reason:?}"),
        EventKind::SlotDead => format!("[slot-dead] slot={slot}"),
        EventKind::LineDropped => format!("[line-dropped] slot={slot} reason={reason:?}"),
        EventKind::LineTruncated => format!("[line-truncated] slot={slot}"),
        EventKind::InputClosed => "[input-closed]".to_string(),
        EventKind::ShutdownRequested => "[shutdown-requested]".to_string(),
        EventKind::PoolStopped => "[pool-stopped]".to_string(),
        EventKind::SubscriberOverflow => format!(
            "[subscriber-overflow] subscriber={} reason={reason}",
            e.subscriber.unwrap_or("unknown")
        ),
        EventKind::SubscriberPanicked => format!(
            "[subscriber-panicked] subscriber={} info={reason}",
            e.subscriber.unwrap_or("unknown")
        ),
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        eprintln!("{}", render(e));
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
