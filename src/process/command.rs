//! # Worker entry point.
//!
//! By default a worker is the running executable re-invoked with the hidden
//! `worker` subcommand, so the supervisor binary is self-contained. Any other
//! program that follows the line contract can be used instead.

use std::ffi::OsString;
use std::path::PathBuf;

use tokio::process::Command;

use crate::error::SpawnError;

/// Subcommand that runs the bundled calculator worker.
pub const WORKER_SUBCOMMAND: &str = "worker";

/// What each worker process runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Re-execute the current binary with the given arguments.
    SelfExec {
        /// Arguments passed to the binary.
        args: Vec<OsString>,
    },
    /// Run an arbitrary program.
    Program {
        /// Program path or name (looked up on `PATH`).
        program: PathBuf,
        /// Program arguments.
        args: Vec<OsString>,
    },
}

impl Default for WorkerCommand {
    /// Returns `SelfExec { args: ["worker"] }`.
    fn default() -> Self {
        WorkerCommand::SelfExec {
            args: vec![WORKER_SUBCOMMAND.into()],
        }
    }
}

impl WorkerCommand {
    /// Creates a command running `program` with no arguments.
    pub fn program(program: impl Into<PathBuf>) -> Self {
        WorkerCommand::Program {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        match &mut self {
            WorkerCommand::SelfExec { args } | WorkerCommand::Program { args, .. } => {
                args.push(arg.into())
            }
        }
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        args.into_iter().fold(self, |cmd, a| cmd.arg(a))
    }

    /// Returns a printable program name for logs and errors.
    pub fn display_name(&self) -> String {
        match self {
            WorkerCommand::SelfExec { .. } => "<self>".to_string(),
            WorkerCommand::Program { program, .. } => program.display().to_string(),
        }
    }

    /// Builds the tokio command (without stdio).
    pub(crate) fn to_command(&self) -> Result<Command, SpawnError> {
        let (program, args) = match self {
            WorkerCommand::SelfExec { args } => {
                let exe = std::env::current_exe().map_err(|source| SpawnError::Launch {
                    program: self.display_name(),
                    source,
                })?;
                (exe, args)
            }
            WorkerCommand::Program { program, args } => (program.clone(), args),
        };

        let mut cmd = Command::new(program);
        cmd.args(args);
        Ok(cmd)
    }
}
