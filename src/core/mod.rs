//! Runtime core: the worker pool and its event loop.
//!
//! The public API from this module is [`Supervisor`] with its builder and
//! configuration, plus the [`RunReport`] it returns.
//!
//! Internal modules:
//! - [`config`]: runtime settings with clamping accessors;
//! - [`builder`]: wires the bus and subscribers into a supervisor;
//! - [`slot`]: one worker slot and its restart state machine;
//! - [`supervisor`]: the readiness loop (dispatch, relay, reap, restart);
//! - [`shutdown`]: OS signal handling.

mod builder;
mod config;
mod shutdown;
mod slot;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use shutdown::{cancel_on_signal, wait_for_shutdown_signal};
pub use slot::{SlotReport, SlotStatus};
pub use supervisor::{RunReport, StopCause, Supervisor};
