//! # Channel endpoints.
//!
//! [`pair`] allocates both ends in one `socketpair(2)` call, so a channel either
//! exists completely or not at all. Every descriptor is close-on-exec: a worker
//! inherits only the three copies installed as its stdio, never the supervisor
//! half nor a sibling's channel.
//!
//! ## Rules
//! - Closing every copy of one end is observed as end-of-stream on the other.
//! - The worker end is duplicated exactly once per standard stream, so the
//!   worker's input, output, and error are one stream from the supervisor's view.

use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::process::Stdio;

use tokio::net::UnixStream;

use crate::error::SpawnError;

/// Creates a new channel.
///
/// Fails with [`SpawnError::ResourceExhausted`] when the OS cannot allocate the
/// pair (descriptor limit, memory).
pub fn pair() -> Result<(SupervisorEnd, WorkerEnd), SpawnError> {
    let (ours, theirs) =
        StdUnixStream::pair().map_err(|e| SpawnError::exhausted("creating channel", e))?;
    Ok((SupervisorEnd { inner: ours }, WorkerEnd { inner: theirs }))
}

/// The half of a channel kept by the supervisor.
#[derive(Debug)]
pub struct SupervisorEnd {
    inner: StdUnixStream,
}

impl SupervisorEnd {
    /// Switches the endpoint to non-blocking mode and registers it with the
    /// current tokio reactor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn into_async(self) -> io::Result<UnixStream> {
        self.inner.set_nonblocking(true)?;
        UnixStream::from_std(self.inner)
    }
}

/// The half of a channel handed to a worker.
#[derive(Debug)]
pub struct WorkerEnd {
    inner: StdUnixStream,
}

/// The worker end bound three times, ready for `Command::stdin/stdout/stderr`.
#[derive(Debug)]
pub struct WorkerStdio {
    /// Worker's standard input.
    pub stdin: Stdio,
    /// Worker's standard output.
    pub stdout: Stdio,
    /// Worker's standard error.
    pub stderr: Stdio,
}

impl WorkerEnd {
    /// Binds the endpoint as the worker's stdin, stdout, and stderr.
    ///
    /// The original descriptor becomes stdin; stdout and stderr get duplicates.
    /// The parent's copies are closed when the returned [`Stdio`] values (and the
    /// command they were given to) are dropped.
    pub fn into_stdio(self) -> Result<WorkerStdio, SpawnError> {
        let out = self
            .inner
            .try_clone()
            .map_err(|e| SpawnError::exhausted("duplicating worker endpoint", e))?;
        let err = self
            .inner
            .try_clone()
            .map_err(|e| SpawnError::exhausted("duplicating worker endpoint", e))?;

        Ok(WorkerStdio {
            stdin: Stdio::from(OwnedFd::from(self.inner)),
            stdout: Stdio::from(OwnedFd::from(out)),
            stderr: Stdio::from(OwnedFd::from(err)),
        })
    }

    /// Registers the endpoint with the current tokio reactor.
    ///
    /// Used by in-process producers (see [`fanin`](crate::fanin)) that speak over
    /// a channel without a child process in between.
    pub fn into_async(self) -> io::Result<UnixStream> {
        self.inner.set_nonblocking(true)?;
        UnixStream::from_std(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn bytes_flow_both_ways() {
        let (ours, theirs) = pair().expect("pair");
        let mut a = ours.into_async().expect("async a");
        let mut b = theirs.into_async().expect("async b");

        a.write_all(b"ping\n").await.unwrap();
        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping\n");

        b.write_all(b"pong\n").await.unwrap();
        a.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong\n");
    }

    #[tokio::test]
    async fn closing_one_end_is_eof_on_the_other() {
        let (ours, theirs) = pair().expect("pair");
        let mut a = ours.into_async().expect("async a");
        drop(theirs);

        let mut buf = Vec::new();
        let n = a.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn eof_waits_for_every_duplicate() {
        let (ours, theirs) = pair().expect("pair");
        let mut a = ours.into_async().expect("async a");
        let stdio = theirs.into_stdio().expect("stdio");

        drop(stdio.stdin);
        drop(stdio.stdout);
        let mut buf = [0u8; 1];
        assert_eq!(
            a.try_read(&mut buf).err().map(|e| e.kind()),
            Some(io::ErrorKind::WouldBlock)
        );

        drop(stdio.stderr);
        let n = a.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }
}
