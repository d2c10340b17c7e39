//! # Spawning worker processes.
//!
//! [`spawn`] starts a [`WorkerCommand`] with a channel endpoint as its only
//! standard stream. The command (and with it the parent's copies of the worker
//! endpoint) is dropped before `spawn` returns, so once the child exits nothing
//! but the supervisor's own half keeps the channel open.
//!
//! ```text
//! WorkerEnd ──► into_stdio() ──► Command { stdin, stdout, stderr } ──► spawn()
//!                                                   │
//!                                      (command dropped: parent copies closed)
//!                                                   ▼
//!                                             WorkerProcess { child, pid }
//! ```

use tokio::process::Child;

use super::{TerminationReason, WorkerCommand};
use crate::channel::WorkerEnd;
use crate::error::SpawnError;

/// A running (or exited but not yet observed) worker process.
///
/// Dropping the handle kills the process if it is still running.
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
    pid: u32,
}

/// Starts a worker process bound to `endpoint`.
///
/// The endpoint is installed as the child's stdin, stdout, and stderr; the child
/// does not inherit any other channel descriptor.
pub fn spawn(endpoint: WorkerEnd, command: &WorkerCommand) -> Result<WorkerProcess, SpawnError> {
    let stdio = endpoint.into_stdio()?;

    let mut cmd = command.to_command()?;
    cmd.stdin(stdio.stdin)
        .stdout(stdio.stdout)
        .stderr(stdio.stderr)
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| SpawnError::from_spawn(command.display_name(), e))?;
    drop(cmd);

    // `id()` is only `None` once the child has been polled to completion.
    let pid = child.id().unwrap_or_default();
    Ok(WorkerProcess { child, pid })
}

impl WorkerProcess {
    /// OS process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Non-blocking exit check.
    ///
    /// Returns `None` while the process is running. A failing status query is
    /// reported as [`TerminationReason::Unknown`]: the process is unusable either
    /// way and the slot gets recycled.
    pub fn try_exit(&mut self) -> Option<TerminationReason> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(TerminationReason::from_status(status)),
            Ok(None) => None,
            Err(_) => Some(TerminationReason::Unknown),
        }
    }

    /// Kills the process and waits for it to be reaped.
    pub async fn kill(&mut self) -> Option<TerminationReason> {
        let _ = self.child.start_kill();
        match self.child.wait().await {
            Ok(status) => Some(TerminationReason::from_status(status)),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn wait_exit(proc: &mut WorkerProcess) -> TerminationReason {
        for _ in 0..200 {
            if let Some(reason) = proc.try_exit() {
                return reason;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("worker {} did not exit", proc.pid());
    }

    #[tokio::test]
    async fn worker_talks_over_its_channel() {
        let (ours, theirs) = channel::pair().unwrap();
        let mut proc = spawn(theirs, &WorkerCommand::program("cat")).expect("spawn cat");
        let mut stream = ours.into_async().unwrap();

        assert!(proc.pid() > 0);
        stream.write_all(b"hello\n").await.unwrap();
        let mut buf = [0u8; 6];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello\n");

        stream.shutdown().await.unwrap();
        assert_eq!(wait_exit(&mut proc).await, TerminationReason::Exited(0));
    }

    #[tokio::test]
    async fn stderr_shares_the_channel() {
        let (ours, theirs) = channel::pair().unwrap();
        let cmd = WorkerCommand::program("sh").args(["-c", "echo out; echo err >&2"]);
        let mut proc = spawn(theirs, &cmd).expect("spawn sh");
        let mut stream = ours.into_async().unwrap();

        let mut text = String::new();
        stream.read_to_string(&mut text).await.unwrap();
        assert_eq!(text, "out\nerr\n");
        assert_eq!(wait_exit(&mut proc).await, TerminationReason::Exited(0));
    }

    #[tokio::test]
    async fn child_exit_closes_the_channel() {
        let (ours, theirs) = channel::pair().unwrap();
        let cmd = WorkerCommand::program("sh").args(["-c", "exit 7"]);
        let mut proc = spawn(theirs, &cmd).expect("spawn sh");
        let mut stream = ours.into_async().unwrap();

        let mut buf = Vec::new();
        assert_eq!(stream.read_to_end(&mut buf).await.unwrap(), 0);
        assert_eq!(wait_exit(&mut proc).await, TerminationReason::Exited(7));
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let (_ours, theirs) = channel::pair().unwrap();
        let err = spawn(theirs, &WorkerCommand::program("/nonexistent/procvisor-worker"))
            .expect_err("must fail");
        assert_eq!(err.as_label(), "spawn_launch");
    }

    #[tokio::test]
    async fn kill_reaps_the_process() {
        let (_ours, theirs) = channel::pair().unwrap();
        let cmd = WorkerCommand::program("sleep").arg("30");
        let mut proc = spawn(theirs, &cmd).expect("spawn sleep");
        let reason = proc.kill().await.expect("reaped");
        assert_eq!(
            reason,
            TerminationReason::Signaled(nix::sys::signal::Signal::SIGKILL)
        );
    }
}
