//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`] centralized settings for the supervisor runtime.
//!
//! ## Sentinel values
//! - `tick = 0s` → clamped to 1ms (the readiness wait must stay bounded and non-zero)
//! - `max_line = 0` → clamped to 1 byte
//! - `bus_capacity = 0` → clamped to 1
//! - `write_buffer` below `max_line + 1` → raised so one full line always fits

use std::time::Duration;

use crate::process::WorkerCommand;

/// Smallest readiness-wait bound the loop will use.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `pool_size`: number of worker slots, fixed for the lifetime of the supervisor
/// - `tick`: readiness-wait bound; reaping runs at least this often without any I/O
/// - `max_line`: longest line (without terminator) passed in either direction
/// - `write_buffer`: bytes of input that may wait for one worker to read them
/// - `bus_capacity`: event bus ring buffer size
/// - `worker`: the program each slot runs
///
/// All fields are public for flexibility. Prefer the clamping accessors over
/// reading `tick`, `max_line`, `write_buffer` and `bus_capacity` directly.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Number of worker slots (must be at least 1).
    pub pool_size: usize,

    /// Upper bound of one readiness wait.
    ///
    /// Any non-zero value keeps reaping live; smaller values notice silent
    /// crashes sooner at the cost of more idle wake-ups.
    pub tick: Duration,

    /// Maximum line length in bytes, terminator excluded.
    ///
    /// Longer lines are truncated, in both directions.
    pub max_line: usize,

    /// Per-slot bound of the outbound queue, in bytes.
    ///
    /// Lines are queued whole. A line that does not fit next to what a slow
    /// worker has not read yet is dropped whole (at-most-once).
    pub write_buffer: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Worker entry point.
    pub worker: WorkerCommand,
}

impl SupervisorConfig {
    /// Returns the tick clamped to a minimum of 1ms.
    #[inline]
    pub fn tick_clamped(&self) -> Duration {
        self.tick.max(MIN_TICK)
    }

    /// Returns the line bound clamped to a minimum of 1.
    #[inline]
    pub fn max_line_clamped(&self) -> usize {
        self.max_line.max(1)
    }

    /// Returns the outbound queue bound, never smaller than one full line.
    #[inline]
    pub fn write_buffer_clamped(&self) -> usize {
        self.write_buffer.max(self.max_line_clamped() + 1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `pool_size = 2`
    /// - `tick = 1s`
    /// - `max_line = 255` (a 256-byte buffer with room for the terminator)
    /// - `write_buffer = 64 KiB`
    /// - `bus_capacity = 1024`
    /// - `worker = WorkerCommand::default()` (re-exec as `worker`)
    fn default() -> Self {
        Self {
            pool_size: 2,
            tick: Duration::from_secs(1),
            max_line: 255,
            write_buffer: 64 * 1024,
            bus_capacity: 1024,
            worker: WorkerCommand::default(),
        }
    }
}
