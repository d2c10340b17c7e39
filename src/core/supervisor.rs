//! # Supervisor: owns the worker pool and drives the readiness loop.
//!
//! The [`Supervisor`] owns the event bus, the subscriber list, and the runtime
//! configuration. [`Supervisor::run`] creates one [`WorkerSlot`] per pool entry,
//! then loops on a single task until the input is exhausted and every worker is
//! gone, or until cancellation.
//!
//! ## Key responsibilities
//! - spawn the initial pool and restart crashed workers one-for-one
//! - dispatch input lines round-robin across live slots
//! - relay complete worker lines to the output, per slot in production order
//! - publish lifecycle events on the [`Bus`] and fan them out via [`SubscriberSet`]
//!
//! ## One pass
//! ```text
//!             ┌──────────────────────────── select! ─────────────────────────────┐
//!             │ token.cancelled()  input.next()  any slot readable/writable  tick │
//!             └──────┬──────────────────┬────────────────────┬───────────────┬──┘
//!                    │                  │                    │               │
//!            ShutdownRequested    dispatch(line)             └───────┬───────┘
//!            kill + reap all      enqueue on the next live slot      │
//!                                       │                            │
//!                                       ▼                            ▼
//!                         service writes: try_write every outbound queue
//!                                       │
//!                                       ▼
//!                         service reads: try_read every live slot, relay lines
//!                                       │
//!                                       ▼
//!                         reap: try_wait every live slot
//!                           ├─ final drain, relay, discard partial line
//!                           ├─ WorkerExited
//!                           └─ not draining ─► respawn ─┬─ ok  ► WorkerRestarted
//!                                                       └─ err ► SpawnFailed, SlotDead
//! ```
//!
//! ## Stop conditions
//! - input closed **and** no live slot → `Ok(RunReport { cause: InputClosed, .. })`
//! - token cancelled → workers killed and reaped → `Ok(RunReport { cause: Cancelled, .. })`
//! - every slot dead → `Err(SupervisorError::NoLiveWorkers)`
//! - the output cannot be written → `Err(SupervisorError::Output)`
//!
//! ## Example
//! ```no_run
//! use procvisor::{Supervisor, SupervisorConfig, WorkerCommand};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SupervisorConfig {
//!         pool_size: 2,
//!         worker: WorkerCommand::program("cat"),
//!         ..SupervisorConfig::default()
//!     };
//!     let sup = Supervisor::builder(cfg).build();
//!     let report = sup
//!         .run(tokio::io::stdin(), tokio::io::stdout(), CancellationToken::new())
//!         .await?;
//!     eprintln!("relayed {} lines", report.lines_relayed);
//!     Ok(())
//! }
//! ```

use std::future;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use super::builder::SupervisorBuilder;
use super::config::SupervisorConfig;
use super::slot::{Reaped, SlotReport, SlotStatus, WorkerSlot};
use crate::channel::{Line, LineCodec};
use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Why [`Supervisor::run`] returned successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// Input reached end-of-stream and every worker finished.
    InputClosed,
    /// The cancellation token fired; workers were killed.
    Cancelled,
}

/// Summary of one [`Supervisor::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Why the loop stopped.
    pub cause: StopCause,
    /// Input lines written completely to a worker.
    pub lines_dispatched: u64,
    /// Worker lines written to the output.
    pub lines_relayed: u64,
    /// Input lines that reached no worker.
    pub lines_dropped: u64,
    /// Workers that exited with a non-zero code or a signal.
    pub crashes: u64,
    /// Successful respawns after a worker exit.
    pub restarts: u64,
    /// Final state of every slot, by index.
    pub slots: Vec<SlotReport>,
}

/// Supervises a fixed pool of worker processes.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Supervisor {
    /// Returns a builder for the given configuration.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            subscribers,
        }
    }

    /// The event bus. Receivers created before [`run`](Self::run) see every event.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The configuration this supervisor was built with.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Runs the pool until input is exhausted and drained, or `token` fires.
    ///
    /// Reads newline-terminated commands from `input`, writes worker output
    /// lines to `output`. Must be called from within a tokio runtime with I/O,
    /// time and process support.
    pub async fn run<R, W>(
        &self,
        input: R,
        output: W,
        token: CancellationToken,
    ) -> Result<RunReport, SupervisorError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if self.cfg.pool_size == 0 {
            return Err(SupervisorError::InvalidConfig {
                reason: "pool size must be at least 1",
            });
        }

        let subs = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());
        let mut pool = Pool::new(&self.cfg, &self.bus, &subs);
        let input = FramedRead::new(input, LineCodec::new(self.cfg.max_line_clamped()));

        let res = pool.drive(input, output, &token).await;
        pool.stop_all().await;
        pool.publish(Event::new(EventKind::PoolStopped));

        let report = res.map(|cause| pool.report(cause));
        drop(pool);
        subs.shutdown().await;
        report
    }
}

#[derive(Default)]
struct Counters {
    dispatched: u64,
    relayed: u64,
    dropped: u64,
    crashes: u64,
    restarts: u64,
}

enum Wake {
    Cancelled,
    Input(Option<std::io::Result<Line>>),
    Ready,
    Tick,
}

/// Mutable state of one run. Only the loop touches it.
struct Pool<'a> {
    cfg: &'a SupervisorConfig,
    bus: &'a Bus,
    subs: &'a SubscriberSet,
    slots: Vec<WorkerSlot>,
    cursor: usize,
    draining: bool,
    counters: Counters,
}

impl<'a> Pool<'a> {
    fn new(cfg: &'a SupervisorConfig, bus: &'a Bus, subs: &'a SubscriberSet) -> Self {
        let max_line = cfg.max_line_clamped();
        let write_buffer = cfg.write_buffer_clamped();
        Self {
            cfg,
            bus,
            subs,
            slots: (0..cfg.pool_size)
                .map(|i| WorkerSlot::new(i, max_line, write_buffer))
                .collect(),
            cursor: 0,
            draining: false,
            counters: Counters::default(),
        }
    }

    fn publish(&self, ev: Event) {
        self.subs.emit(&ev);
        self.bus.publish(ev);
    }

    async fn drive<R, W>(
        &mut self,
        mut input: FramedRead<R, LineCodec>,
        mut output: W,
        token: &CancellationToken,
    ) -> Result<StopCause, SupervisorError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.spawn_initial();
        let tick = self.cfg.tick_clamped();

        loop {
            if self.draining {
                if !self.slots.iter().any(WorkerSlot::is_live) {
                    return Ok(StopCause::InputClosed);
                }
            } else if self.slots.iter().all(|s| s.status() == SlotStatus::Dead) {
                return Err(SupervisorError::NoLiveWorkers {
                    pool: self.slots.len(),
                });
            }

            let wake = {
                let mut ready: FuturesUnordered<_> = self
                    .slots
                    .iter()
                    .filter_map(WorkerSlot::interest)
                    .map(|(stream, interest)| stream.ready(interest))
                    .collect();
                let any_ready = async {
                    if ready.is_empty() {
                        future::pending::<()>().await;
                    }
                    let _ = ready.next().await;
                };

                tokio::select! {
                    biased;
                    _ = token.cancelled() => Wake::Cancelled,
                    line = input.next(), if !self.draining => Wake::Input(line),
                    _ = any_ready => Wake::Ready,
                    _ = tokio::time::sleep(tick) => Wake::Tick,
                }
            };

            match wake {
                Wake::Cancelled => {
                    self.publish(Event::new(EventKind::ShutdownRequested));
                    return Ok(StopCause::Cancelled);
                }
                Wake::Input(Some(Ok(line))) => self.dispatch(line),
                Wake::Input(Some(Err(e))) => self.start_draining(Some(e.to_string())),
                Wake::Input(None) => self.start_draining(None),
                Wake::Ready | Wake::Tick => {}
            }

            self.service_writes();
            self.service_reads(&mut output).await?;
            self.reap_and_restart(&mut output).await?;
            output.flush().await.map_err(SupervisorError::Output)?;
        }
    }

    fn spawn_initial(&mut self) {
        for i in 0..self.slots.len() {
            match self.slots[i].spawn(&self.cfg.worker) {
                Ok(pid) => self.publish(
                    Event::new(EventKind::WorkerSpawned)
                        .with_slot(i)
                        .with_pid(pid)
                        .with_generation(self.slots[i].generation()),
                ),
                Err(e) => {
                    self.publish(
                        Event::new(EventKind::SpawnFailed)
                            .with_slot(i)
                            .with_reason(e.as_message()),
                    );
                    self.slots[i].mark_dead();
                    self.publish(Event::new(EventKind::SlotDead).with_slot(i));
                }
            }
        }
    }

    /// Queues one input line on the next live slot after the cursor.
    ///
    /// The line is written by [`service_writes`](Self::service_writes) and
    /// counted as dispatched once its last byte reaches the worker.
    fn dispatch(&mut self, line: Line) {
        if line.truncated {
            self.publish(Event::new(EventKind::LineTruncated));
        }

        let n = self.slots.len();
        let Some(target) = (0..n)
            .map(|k| (self.cursor + k) % n)
            .find(|&i| self.slots[i].is_live())
        else {
            self.counters.dropped += 1;
            self.publish(Event::new(EventKind::LineDropped).with_reason("no live worker"));
            return;
        };
        self.cursor = (target + 1) % n;

        if let Err(reason) = self.slots[target].enqueue(&line.terminated()) {
            self.counters.dropped += 1;
            self.publish(
                Event::new(EventKind::LineDropped)
                    .with_slot(target)
                    .with_reason(reason),
            );
        }
    }

    fn start_draining(&mut self, error: Option<String>) {
        self.draining = true;
        let mut ev = Event::new(EventKind::InputClosed);
        if let Some(e) = error {
            ev = ev.with_reason(e);
        }
        self.publish(ev);
        for slot in &mut self.slots {
            slot.close_input();
        }
    }

    /// Writes queued input to every live slot without blocking.
    fn service_writes(&mut self) {
        for i in 0..self.slots.len() {
            let flushed = self.slots[i].flush();
            self.counters.dispatched += flushed.written as u64;
            if let Some(e) = flushed.error {
                self.counters.dropped += flushed.lost as u64;
                self.publish(
                    Event::new(EventKind::LineDropped)
                        .with_slot(i)
                        .with_reason(format!("worker input failed, {} lines lost: {e}", flushed.lost)),
                );
            }
        }
    }

    async fn service_reads<W>(&mut self, output: &mut W) -> Result<(), SupervisorError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut lines = Vec::new();
        for i in 0..self.slots.len() {
            if self.slots[i].read_available(&mut lines) == 0 {
                continue;
            }
            for line in lines.drain(..) {
                self.relay(output, i, line).await?;
            }
        }
        Ok(())
    }

    async fn reap_and_restart<W>(&mut self, output: &mut W) -> Result<(), SupervisorError>
    where
        W: AsyncWrite + Unpin,
    {
        for i in 0..self.slots.len() {
            let Some(reaped) = self.slots[i].try_reap() else {
                continue;
            };
            let Reaped {
                pid,
                reason,
                lines,
                discarded,
                unsent,
            } = reaped;

            for line in lines {
                self.relay(output, i, line).await?;
            }
            if reason.is_crash() {
                self.counters.crashes += 1;
            }
            self.publish(
                Event::new(EventKind::WorkerExited)
                    .with_slot(i)
                    .with_pid(pid)
                    .with_generation(self.slots[i].generation())
                    .with_reason(reason.to_string()),
            );
            if discarded > 0 {
                self.publish(
                    Event::new(EventKind::LineDropped)
                        .with_slot(i)
                        .with_pid(pid)
                        .with_reason(format!("discarded {discarded} bytes of partial output")),
                );
            }
            if unsent > 0 {
                self.counters.dropped += unsent as u64;
                self.publish(
                    Event::new(EventKind::LineDropped)
                        .with_slot(i)
                        .with_pid(pid)
                        .with_reason(format!("{unsent} queued lines never reached the worker")),
                );
            }

            if !self.draining {
                self.respawn(i, pid);
            }
        }
        Ok(())
    }

    fn respawn(&mut self, i: usize, prev_pid: u32) {
        match self.slots[i].spawn(&self.cfg.worker) {
            Ok(pid) => {
                self.counters.restarts += 1;
                self.publish(
                    Event::new(EventKind::WorkerRestarted)
                        .with_slot(i)
                        .with_pid(pid)
                        .with_prev_pid(prev_pid)
                        .with_generation(self.slots[i].generation()),
                );
            }
            Err(e) => {
                self.publish(
                    Event::new(EventKind::SpawnFailed)
                        .with_slot(i)
                        .with_reason(e.as_message()),
                );
                self.slots[i].mark_dead();
                self.publish(
                    Event::new(EventKind::SlotDead)
                        .with_slot(i)
                        .with_prev_pid(prev_pid),
                );
            }
        }
    }

    async fn relay<W>(&mut self, output: &mut W, slot: usize, line: Line) -> Result<(), SupervisorError>
    where
        W: AsyncWrite + Unpin,
    {
        if line.truncated {
            self.publish(Event::new(EventKind::LineTruncated).with_slot(slot));
        }
        output
            .write_all(&line.terminated())
            .await
            .map_err(SupervisorError::Output)?;
        self.counters.relayed += 1;
        Ok(())
    }

    /// Kills and reaps every live worker.
    async fn stop_all(&mut self) {
        for i in 0..self.slots.len() {
            let generation = self.slots[i].generation();
            if let Some((pid, reason)) = self.slots[i].kill().await {
                let reason = reason.map_or_else(|| "killed".to_string(), |r| r.to_string());
                self.publish(
                    Event::new(EventKind::WorkerExited)
                        .with_slot(i)
                        .with_pid(pid)
                        .with_generation(generation)
                        .with_reason(reason),
                );
            }
        }
    }

    fn report(&self, cause: StopCause) -> RunReport {
        RunReport {
            cause,
            lines_dispatched: self.counters.dispatched,
            lines_relayed: self.counters.relayed,
            lines_dropped: self.counters.dropped,
            crashes: self.counters.crashes,
            restarts: self.counters.restarts,
            slots: self.slots.iter().map(WorkerSlot::report).collect(),
        }
    }
}
