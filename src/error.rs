//! Error types used by the procvisor runtime and its workers.
//!
//! This module defines three error enums:
//!
//! - [`SpawnError`]: a worker slot could not be (re)populated: the channel or
//!   the process could not be created.
//! - [`SupervisorError`]: errors raised by the event loop itself.
//! - [`FaninError`]: errors raised by the fan-in demo collector.
//!
//! Worker crashes are **not** errors: they are expected, recovered by restart,
//! and only observable through [`EventKind::WorkerExited`](crate::EventKind::WorkerExited).
//!
//! All types provide `as_label` for logging; [`SpawnError::as_message`] also
//! renders the failing operation for `SpawnFailed` events.

use std::io;

use thiserror::Error;

/// # Errors produced while creating a worker.
///
/// Either variant leaves the affected slot permanently dead when it happens
/// during a restart; during startup it is fatal only if it hits every slot.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The OS refused to allocate a channel, a descriptor, or a process.
    #[error("resources exhausted while {op}: {source}")]
    ResourceExhausted {
        /// What was being allocated (e.g. "creating channel").
        op: &'static str,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The worker program could not be started.
    #[error("cannot launch worker program {program:?}: {source}")]
    Launch {
        /// Program path as configured (or resolved for self-exec).
        program: String,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl SpawnError {
    /// Classifies an allocation failure.
    ///
    /// Descriptor and memory limits map to [`SpawnError::ResourceExhausted`];
    /// everything else is treated the same way since nothing else can fail
    /// when creating a socket pair or duplicating a descriptor.
    pub(crate) fn exhausted(op: &'static str, source: io::Error) -> Self {
        SpawnError::ResourceExhausted { op, source }
    }

    /// Classifies a failed `spawn` of the worker program.
    ///
    /// `EMFILE`, `ENFILE`, `EAGAIN` and `ENOMEM` are resource exhaustion;
    /// anything else (missing binary, permissions) is a launch failure.
    pub(crate) fn from_spawn(program: String, source: io::Error) -> Self {
        let exhausted = matches!(
            source.raw_os_error(),
            Some(code) if code == libc_code::EMFILE
                || code == libc_code::ENFILE
                || code == libc_code::EAGAIN
                || code == libc_code::ENOMEM
        );
        if exhausted {
            SpawnError::ResourceExhausted {
                op: "spawning worker",
                source,
            }
        } else {
            SpawnError::Launch { program, source }
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use procvisor::SpawnError;
    ///
    /// let err = SpawnError::Launch {
    ///     program: "/nope".into(),
    ///     source: std::io::Error::from(std::io::ErrorKind::NotFound),
    /// };
    /// assert_eq!(err.as_label(), "spawn_launch");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::ResourceExhausted { .. } => "spawn_resource_exhausted",
            SpawnError::Launch { .. } => "spawn_launch",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SpawnError::ResourceExhausted { op, source } => format!("{op}: {source}"),
            SpawnError::Launch { program, source } => format!("launch {program}: {source}"),
        }
    }
}

/// Errno values used to classify spawn failures.
mod libc_code {
    use nix::errno::Errno;

    pub const EMFILE: i32 = Errno::EMFILE as i32;
    pub const ENFILE: i32 = Errno::ENFILE as i32;
    pub const EAGAIN: i32 = Errno::EAGAIN as i32;
    pub const ENOMEM: i32 = Errno::ENOMEM as i32;
}

/// # Errors produced by the supervisor event loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Not a single slot can ever become live again.
    #[error("no live workers: all {pool} slots are permanently dead")]
    NoLiveWorkers {
        /// Configured pool size.
        pool: usize,
    },

    /// The configuration cannot be used to build a pool.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Writing relayed lines to the supervisor's own output failed.
    #[error("supervisor output failed: {0}")]
    Output(#[source] io::Error),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use procvisor::SupervisorError;
    ///
    /// let err = SupervisorError::NoLiveWorkers { pool: 2 };
    /// assert_eq!(err.as_label(), "supervisor_no_live_workers");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::NoLiveWorkers { .. } => "supervisor_no_live_workers",
            SupervisorError::InvalidConfig { .. } => "supervisor_invalid_config",
            SupervisorError::Output(_) => "supervisor_output",
        }
    }
}

/// # Errors produced by the fan-in collector.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FaninError {
    /// A producer channel could not be created.
    #[error(transparent)]
    Channel(#[from] SpawnError),

    /// Reading a channel or writing the output failed.
    #[error("fan-in i/o failed: {0}")]
    Io(#[from] io::Error),

    /// A producer task panicked or was aborted.
    #[error("producer {index} did not finish: {reason}")]
    Producer {
        /// Producer index.
        index: usize,
        /// Join error text.
        reason: String,
    },
}

impl FaninError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            FaninError::Channel(_) => "fanin_channel",
            FaninError::Io(_) => "fanin_io",
            FaninError::Producer { .. } => "fanin_producer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emfile_is_resource_exhaustion() {
        let err = SpawnError::from_spawn(
            "worker".into(),
            io::Error::from_raw_os_error(libc_code::EMFILE),
        );
        assert_eq!(err.as_label(), "spawn_resource_exhausted");
    }

    #[test]
    fn missing_program_is_launch_failure() {
        let err = SpawnError::from_spawn(
            "/does/not/exist".into(),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert_eq!(err.as_label(), "spawn_launch");
        assert!(err.as_message().contains("/does/not/exist"));
    }

    #[test]
    fn supervisor_labels_are_stable() {
        assert_eq!(
            SupervisorError::InvalidConfig { reason: "x" }.as_label(),
            "supervisor_invalid_config"
        );
        assert_eq!(
            SupervisorError::Output(io::Error::from(io::ErrorKind::BrokenPipe)).as_label(),
            "supervisor_output"
        );
    }
}
