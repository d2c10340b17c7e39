//! # Worker slot: one logical worker and its restart state machine.
//!
//! A slot binds a fixed index in the pool to its current process and the
//! supervisor's half of that process's channel. It is the unit of restart.
//!
//! ## States
//! ```text
//!                 spawn ok                 exit observed
//! Uninitialized ───────────► Live ─────────────────────────► Terminated
//!       │                     ▲                                  │
//!       │ spawn failed        └────────── spawn ok ──────────────┤
//!       ▼                                                        │ spawn failed
//!      Dead ◄────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - A channel endpoint exists **iff** the slot is `Live`.
//! - End-of-stream on the channel only makes a live slot *suspect*: it leaves the
//!   readiness set, and the non-blocking exit check decides.
//! - Reaping drains whatever the dead worker left in the channel, relays the
//!   complete lines, and discards the trailing partial line.
//! - Every successful spawn bumps `generation`; a restart never reuses the
//!   previous channel or buffered bytes.
//! - Input for the worker goes through a bounded outbound queue that only
//!   ever admits whole lines. The queue is written with non-blocking writes,
//!   so a line is either delivered completely or never started.

use std::io::{self, Read};
use std::os::fd::AsRawFd;

use bytes::{Buf, BytesMut};
use nix::sys::socket::{Shutdown, shutdown};
use tokio::io::Interest;
use tokio::net::UnixStream;
use tokio_util::codec::Decoder;

use crate::channel::{self, Line, LineCodec};
use crate::error::SpawnError;
use crate::process::{self, TerminationReason, WorkerCommand, WorkerProcess};

/// Bytes pulled from one channel per pass before moving on to the next slot.
const READ_BUDGET: usize = 64 * 1024;
/// Read buffer growth step.
const READ_CHUNK: usize = 4 * 1024;

/// Externally visible slot state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Never spawned.
    Uninitialized,
    /// A worker process is running behind the slot's channel.
    Live,
    /// The worker exited and the slot was not repopulated (pool draining).
    Terminated,
    /// Spawning failed; the slot is never retried.
    Dead,
}

/// Final or current view of a slot, as returned in a [`RunReport`](crate::RunReport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotReport {
    /// Slot index.
    pub index: usize,
    /// Slot state.
    pub status: SlotStatus,
    /// Number of successful spawns.
    pub generation: u64,
    /// Most recent worker pid.
    pub last_pid: Option<u32>,
}

/// A worker observed as exited, with what it left behind.
#[derive(Debug)]
pub(crate) struct Reaped {
    pub pid: u32,
    pub reason: TerminationReason,
    /// Complete lines found in the channel after the exit.
    pub lines: Vec<Line>,
    /// Bytes of the unterminated last line that were thrown away.
    pub discarded: usize,
    /// Queued input lines the worker never received.
    pub unsent: usize,
}

/// Result of one non-blocking write pass over the outbound queue.
#[derive(Debug, Default)]
pub(crate) struct Flushed {
    /// Input lines whose last byte reached the worker.
    pub written: usize,
    /// Queued lines thrown away because the channel failed.
    pub lost: usize,
    /// The write error behind `lost`.
    pub error: Option<io::Error>,
}

struct LiveWorker {
    process: WorkerProcess,
    stream: UnixStream,
    suspect: bool,
    /// No more input will be queued; shut the write half down once drained.
    close_requested: bool,
    input_closed: bool,
}

enum SlotState {
    Uninitialized,
    Live(LiveWorker),
    Terminated,
    Dead,
}

pub(crate) struct WorkerSlot {
    index: usize,
    generation: u64,
    last_pid: Option<u32>,
    state: SlotState,
    pending: BytesMut,
    codec: LineCodec,
    outbound: BytesMut,
    outbound_limit: usize,
}

impl WorkerSlot {
    /// `outbound_limit` bounds the bytes queued for the worker.
    pub fn new(index: usize, max_line: usize, outbound_limit: usize) -> Self {
        Self {
            index,
            generation: 0,
            last_pid: None,
            state: SlotState::Uninitialized,
            pending: BytesMut::new(),
            codec: LineCodec::new(max_line),
            outbound: BytesMut::new(),
            outbound_limit,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> SlotStatus {
        match self.state {
            SlotState::Uninitialized => SlotStatus::Uninitialized,
            SlotState::Live(_) => SlotStatus::Live,
            SlotState::Terminated => SlotStatus::Terminated,
            SlotState::Dead => SlotStatus::Dead,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, SlotState::Live(_))
    }

    pub fn report(&self) -> SlotReport {
        SlotReport {
            index: self.index,
            status: self.status(),
            generation: self.generation,
            last_pid: self.last_pid,
        }
    }

    /// Populates the slot with a fresh channel and worker process.
    ///
    /// Valid from `Uninitialized` and `Terminated`. On success the slot is
    /// `Live` with empty read state; on failure it is unchanged.
    pub fn spawn(&mut self, command: &WorkerCommand) -> Result<u32, SpawnError> {
        debug_assert!(!self.is_live(), "spawn on a live slot");

        let (ours, theirs) = channel::pair()?;
        let stream = ours
            .into_async()
            .map_err(|e| SpawnError::exhausted("registering channel", e))?;
        let process = process::spawn(theirs, command)?;
        let pid = process.pid();

        self.pending.clear();
        self.codec.reset();
        self.outbound.clear();
        self.generation += 1;
        self.last_pid = Some(pid);
        self.state = SlotState::Live(LiveWorker {
            process,
            stream,
            suspect: false,
            close_requested: false,
            input_closed: false,
        });
        Ok(pid)
    }

    /// Marks the slot permanently dead.
    pub fn mark_dead(&mut self) {
        self.pending.clear();
        self.codec.reset();
        self.outbound.clear();
        self.state = SlotState::Dead;
    }

    /// The endpoint to include in this pass's readiness set, if any, and
    /// what to wait for on it.
    ///
    /// Write interest is only registered while input is queued.
    pub fn interest(&self) -> Option<(&UnixStream, Interest)> {
        match &self.state {
            SlotState::Live(live) if !live.suspect => {
                let interest = if self.outbound.is_empty() {
                    Interest::READABLE
                } else {
                    Interest::READABLE | Interest::WRITABLE
                };
                Some((&live.stream, interest))
            }
            _ => None,
        }
    }

    /// Queues one line (terminator included) for the worker.
    ///
    /// The line is taken whole or not at all: it is refused when the slot is
    /// not live, its input is closing, or it does not fit in the queue.
    pub fn enqueue(&mut self, line: &[u8]) -> Result<(), &'static str> {
        let SlotState::Live(live) = &self.state else {
            return Err("slot is not live");
        };
        if live.close_requested || live.suspect {
            return Err("worker input closed");
        }
        if self.outbound.len() + line.len() > self.outbound_limit {
            return Err("worker input queue full");
        }
        self.outbound.extend_from_slice(line);
        Ok(())
    }

    /// Writes as much queued input as the channel takes without blocking.
    ///
    /// A write error throws the rest of the queue away and makes the slot
    /// suspect. Once the queue is empty after [`close_input`](Self::close_input),
    /// the write half is shut down.
    pub fn flush(&mut self) -> Flushed {
        let mut flushed = Flushed::default();
        let SlotState::Live(live) = &mut self.state else {
            return flushed;
        };

        while !self.outbound.is_empty() {
            match live.stream.try_write(&self.outbound) {
                Ok(0) => break,
                Ok(n) => {
                    flushed.written += count_lines(&self.outbound[..n]);
                    self.outbound.advance(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    flushed.lost = count_lines(&self.outbound);
                    flushed.error = Some(e);
                    self.outbound.clear();
                    live.suspect = true;
                    break;
                }
            }
        }

        if self.outbound.is_empty() && live.close_requested && !live.input_closed {
            // The worker may already be gone; the exit check reports that.
            let _ = shutdown(live.stream.as_raw_fd(), Shutdown::Write);
            live.input_closed = true;
        }
        flushed
    }

    /// Reads whatever is available without blocking and appends complete lines
    /// to `out`. Returns the number of lines appended.
    ///
    /// End-of-stream or a read error makes the slot suspect.
    pub fn read_available(&mut self, out: &mut Vec<Line>) -> usize {
        let SlotState::Live(live) = &mut self.state else {
            return 0;
        };
        if live.suspect {
            return 0;
        }

        let mut budget = READ_BUDGET;
        while budget > 0 {
            self.pending.reserve(READ_CHUNK);
            match live.stream.try_read_buf(&mut self.pending) {
                Ok(0) => {
                    live.suspect = true;
                    break;
                }
                Ok(n) => budget = budget.saturating_sub(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    live.suspect = true;
                    break;
                }
            }
        }

        self.decode_pending(out)
    }

    /// Non-blocking exit check.
    ///
    /// When the worker has exited, drains the channel one last time, tears it
    /// down, discards the partial line, and moves to `Terminated`.
    pub fn try_reap(&mut self) -> Option<Reaped> {
        let SlotState::Live(live) = &mut self.state else {
            return None;
        };
        let reason = live.process.try_exit()?;
        let pid = live.process.pid();

        let SlotState::Live(live) = std::mem::replace(&mut self.state, SlotState::Terminated)
        else {
            return None;
        };
        drain_exited(live.stream, &mut self.pending);

        let mut lines = Vec::new();
        self.decode_pending(&mut lines);
        let discarded = self.pending.len();
        let unsent = count_lines(&self.outbound);
        self.pending.clear();
        self.outbound.clear();
        self.codec.reset();

        Some(Reaped {
            pid,
            reason,
            lines,
            discarded,
            unsent,
        })
    }

    /// Stops accepting input. The worker observes end-of-stream as soon as
    /// the queued lines are written.
    pub fn close_input(&mut self) {
        if let SlotState::Live(live) = &mut self.state {
            live.close_requested = true;
        }
    }

    /// Kills a live worker and tears the slot down. Returns the pid killed.
    pub async fn kill(&mut self) -> Option<(u32, Option<TerminationReason>)> {
        if !self.is_live() {
            return None;
        }
        let SlotState::Live(mut live) = std::mem::replace(&mut self.state, SlotState::Terminated)
        else {
            return None;
        };
        let pid = live.process.pid();
        let reason = live.process.kill().await;
        self.pending.clear();
        self.outbound.clear();
        self.codec.reset();
        Some((pid, reason))
    }

    fn decode_pending(&mut self, out: &mut Vec<Line>) -> usize {
        let mut n = 0;
        // The codec never fails on in-memory bytes.
        while let Ok(Some(line)) = self.codec.decode(&mut self.pending) {
            out.push(line);
            n += 1;
        }
        n
    }
}

fn count_lines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}

/// Pulls every byte still queued in a dead worker's channel.
///
/// Goes through a plain non-blocking read so bytes are found even when the
/// reactor has not reported readiness yet.
fn drain_exited(stream: UnixStream, pending: &mut BytesMut) {
    let Ok(mut stream) = stream.into_std() else {
        return;
    };
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn sh(script: &str) -> WorkerCommand {
        WorkerCommand::program("sh").args(["-c", script])
    }

    async fn reap(slot: &mut WorkerSlot) -> Reaped {
        for _ in 0..300 {
            if let Some(r) = slot.try_reap() {
                return r;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("slot {} never exited", slot.report().index);
    }

    #[tokio::test]
    async fn spawn_moves_to_live_and_bumps_generation() {
        let mut slot = WorkerSlot::new(0, 64, 1024);
        assert_eq!(slot.status(), SlotStatus::Uninitialized);

        let pid = slot.spawn(&WorkerCommand::program("cat")).expect("spawn");
        assert_eq!(slot.status(), SlotStatus::Live);
        assert_eq!(slot.generation(), 1);
        assert_eq!(slot.report().last_pid, Some(pid));
        assert!(slot.interest().is_some());

        slot.kill().await.expect("killed");
        assert_eq!(slot.status(), SlotStatus::Terminated);
    }

    #[tokio::test]
    async fn echo_round_trip_through_the_slot() {
        let mut slot = WorkerSlot::new(0, 64, 1024);
        slot.spawn(&WorkerCommand::program("cat")).unwrap();
        slot.enqueue(b"a\nb\n").unwrap();
        assert_eq!(slot.flush().written, 2);

        let mut lines = Vec::new();
        for _ in 0..200 {
            let (stream, _) = slot.interest().unwrap();
            stream.readable().await.unwrap();
            slot.read_available(&mut lines);
            if lines.len() == 2 {
                break;
            }
        }
        assert_eq!(&lines[0].bytes[..], b"a");
        assert_eq!(&lines[1].bytes[..], b"b");
        slot.kill().await;
    }

    #[tokio::test]
    async fn reaping_relays_final_lines_and_discards_the_partial_one() {
        let mut slot = WorkerSlot::new(3, 64, 1024);
        slot.spawn(&sh("printf 'done\\nhalf'; exit 9")).unwrap();

        let reaped = reap(&mut slot).await;
        assert_eq!(reaped.reason, TerminationReason::Exited(9));
        assert_eq!(reaped.lines.len(), 1);
        assert_eq!(&reaped.lines[0].bytes[..], b"done");
        assert_eq!(reaped.discarded, 4);
        assert_eq!(slot.status(), SlotStatus::Terminated);
        assert!(slot.interest().is_none());
    }

    #[tokio::test]
    async fn respawn_gets_a_new_pid_and_clean_buffers() {
        let mut slot = WorkerSlot::new(1, 64, 1024);
        let first = slot.spawn(&sh("printf 'partial'; exit 1")).unwrap();
        let reaped = reap(&mut slot).await;
        assert_eq!(reaped.pid, first);

        let second = slot.spawn(&sh("echo fresh; exit 0")).unwrap();
        assert_ne!(first, second);
        assert_eq!(slot.generation(), 2);

        let reaped = reap(&mut slot).await;
        assert_eq!(reaped.lines.len(), 1);
        assert_eq!(&reaped.lines[0].bytes[..], b"fresh");
    }

    #[tokio::test]
    async fn end_of_stream_makes_the_slot_suspect() {
        let mut slot = WorkerSlot::new(0, 64, 1024);
        // Closes its stdio but keeps running for a while.
        slot.spawn(&sh("exec 0<&- 1>&- 2>&-; sleep 5")).unwrap();

        let mut lines = Vec::new();
        for _ in 0..200 {
            match slot.interest() {
                Some((stream, _)) => {
                    stream.readable().await.unwrap();
                    slot.read_available(&mut lines);
                }
                None => break,
            }
        }
        assert!(slot.interest().is_none());
        assert!(slot.is_live());
        assert!(slot.try_reap().is_none());
        slot.kill().await;
    }

    #[tokio::test]
    async fn failed_spawn_leaves_the_slot_unchanged() {
        let mut slot = WorkerSlot::new(0, 64, 1024);
        let err = slot
            .spawn(&WorkerCommand::program("/nonexistent/worker"))
            .expect_err("spawn must fail");
        assert_eq!(err.as_label(), "spawn_launch");
        assert_eq!(slot.status(), SlotStatus::Uninitialized);

        slot.mark_dead();
        assert_eq!(slot.status(), SlotStatus::Dead);
        assert_eq!(slot.enqueue(b"x\n"), Err("slot is not live"));
    }

    #[tokio::test]
    async fn queue_takes_whole_lines_or_nothing() {
        let mut slot = WorkerSlot::new(0, 64, 10);
        slot.spawn(&WorkerCommand::program("cat")).unwrap();

        slot.enqueue(b"abcdef\n").unwrap();
        assert_eq!(slot.enqueue(b"ghij\n"), Err("worker input queue full"));
        slot.enqueue(b"xy\n").unwrap();
        let (_, interest) = slot.interest().unwrap();
        assert!(interest.is_writable());

        let flushed = slot.flush();
        assert_eq!(flushed.written, 2);
        assert!(flushed.error.is_none());
        let (_, interest) = slot.interest().unwrap();
        assert!(!interest.is_writable());

        let mut lines = Vec::new();
        for _ in 0..200 {
            let (stream, _) = slot.interest().unwrap();
            stream.readable().await.unwrap();
            slot.read_available(&mut lines);
            if lines.len() == 2 {
                break;
            }
        }
        assert_eq!(&lines[0].bytes[..], b"abcdef");
        assert_eq!(&lines[1].bytes[..], b"xy");
        slot.kill().await;
    }

    #[tokio::test]
    async fn closing_input_waits_for_the_queue_then_ends_the_stream() {
        let mut slot = WorkerSlot::new(0, 64, 1024);
        slot.spawn(&sh("n=0; while read l; do n=$((n+1)); done; echo \"$n\"")).unwrap();

        slot.enqueue(b"1\n2\n3\n").unwrap();
        slot.close_input();
        assert_eq!(slot.enqueue(b"4\n"), Err("worker input closed"));
        assert_eq!(slot.flush().written, 3);

        let reaped = reap(&mut slot).await;
        assert_eq!(reaped.reason, TerminationReason::Exited(0));
        assert_eq!(reaped.unsent, 0);
        assert_eq!(&reaped.lines[0].bytes[..], b"3");
    }

    #[tokio::test]
    async fn lines_queued_for_a_dead_worker_are_reported_unsent() {
        let mut slot = WorkerSlot::new(0, 64, 1 << 20);
        slot.spawn(&sh("exit 4")).unwrap();
        let big = [b'z'; 4096];
        let mut line = big.to_vec();
        line.push(b'\n');
        // Queue without flushing so the bytes stay ours.
        for _ in 0..3 {
            slot.enqueue(&line).unwrap();
        }

        let reaped = reap(&mut slot).await;
        assert_eq!(reaped.reason, TerminationReason::Exited(4));
        assert_eq!(reaped.unsent, 3);
    }
}
