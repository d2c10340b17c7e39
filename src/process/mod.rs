//! Worker processes: what to run, how to start it, and how it ended.
//!
//! ## Contents
//! - [`WorkerCommand`] the worker entry point (self re-exec or external program)
//! - [`spawn`] / [`WorkerProcess`] start a worker bound to a channel, poll its exit
//! - [`TerminationReason`] classification of an exit status
//!
//! A worker's internal logic is a black box. It may exit at any time, mid-line,
//! with any status; the supervisor only ever observes that through
//! [`WorkerProcess::try_exit`].

mod command;
mod exit;
mod spawn;

pub use command::{WORKER_SUBCOMMAND, WorkerCommand};
pub use exit::TerminationReason;
pub use spawn::{WorkerProcess, spawn};
