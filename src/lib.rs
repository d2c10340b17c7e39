//! # procvisor
//!
//! **Procvisor** is a small process supervisor for Unix.
//!
//! It keeps a fixed pool of worker processes, each connected to the supervisor
//! through a private socket-pair channel used as the worker's stdin, stdout and
//! stderr. Input lines are spread round-robin across the pool, worker output is
//! relayed line by line, and a worker that dies for any reason is replaced
//! in place (one-for-one) while its siblings keep running.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!            stdin (lines)                                    stdout (lines)
//!                 │                                                 ▲
//!                 ▼                                                 │
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │  Supervisor::run (one task, tokio current-thread runtime)                 │
//! │  - FramedRead<LineCodec> over input                                       │
//! │  - WorkerSlot × pool_size  (state machine, generation, read buffer)       │
//! │  - round-robin cursor                                                     │
//! │  - Bus + SubscriberSet      (events)                                      │
//! └──────┬───────────────────────────┬───────────────────────────┬────────────┘
//!        │ channel 0                 │ channel 1                 │ channel N-1
//!        ▼                           ▼                           ▼
//!   ┌──────────┐                ┌──────────┐                ┌──────────┐
//!   │ worker 0 │                │ worker 1 │      ...       │ worker N │
//!   │ fd 0/1/2 │                │ fd 0/1/2 │                │ fd 0/1/2 │
//!   └──────────┘                └──────────┘                └──────────┘
//!
//! Events:
//!   Supervisor ── publish(Event) ──┬──► Bus (broadcast) ──► bus().subscribe()
//!                                  └──► SubscriberSet ──► LogWriter, custom ...
//! ```
//!
//! ### Slot lifecycle
//! ```text
//! Uninitialized ──spawn──► Live ──exit observed──► Terminated ──respawn──► Live ...
//!        │                  │                           │
//!        └──spawn failed──► Dead ◄─────spawn failed─────┘
//!
//! per pass:
//!   ├─► wait: input line | any channel readable or writable | tick | cancellation
//!   ├─► queue input line on the next live slot (round-robin), whole or not at all
//!   ├─► write queued input without blocking
//!   ├─► read every live channel, relay complete lines
//!   └─► try_wait every live slot:
//!         ├─ final drain, relay complete lines, discard partial line
//!         ├─ publish WorkerExited
//!         └─ respawn ─► WorkerRestarted | SpawnFailed + SlotDead
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                       |
//! |-------------------|---------------------------------------------------------------|------------------------------------------|
//! | **Supervision**   | Run a pool of workers, restart them, route lines.             | [`Supervisor`], [`RunReport`]            |
//! | **Configuration** | Centralize runtime settings.                                  | [`SupervisorConfig`], [`WorkerCommand`]  |
//! | **Channels**      | Socket-pair channels and the bounded line codec.              | [`channel::pair`], [`channel::LineCodec`]|
//! | **Processes**     | Spawn workers on a channel, classify their exit.              | [`process::spawn`], [`TerminationReason`]|
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).        | [`Subscribe`], [`Event`]                 |
//! | **Errors**        | Typed errors for spawning, the loop, and the fan-in demo.     | [`SpawnError`], [`SupervisorError`]      |
//! | **Worker**        | The bundled stack calculator worker.                          | [`calc::run`]                            |
//! | **Fan-in**        | Many producer tasks multiplexed into one collector.           | [`fanin::run`]                           |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] (enabled by default).
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use procvisor::{Supervisor, SupervisorConfig, WorkerCommand};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SupervisorConfig {
//!         pool_size: 4,
//!         worker: WorkerCommand::program("cat"),
//!         ..SupervisorConfig::default()
//!     };
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn procvisor::Subscribe>> = vec![Arc::new(procvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn procvisor::Subscribe>> = Vec::new();
//!
//!     let sup = Supervisor::builder(cfg).with_subscribers(subs).build();
//!     let token = CancellationToken::new();
//!     procvisor::cancel_on_signal(token.clone());
//!
//!     let report = sup.run(tokio::io::stdin(), tokio::io::stdout(), token).await?;
//!     eprintln!("{} restarts", report.restarts);
//!     Ok(())
//! }
//! ```

pub mod calc;
pub mod channel;
mod core;
mod error;
mod events;
pub mod fanin;
pub mod process;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{
    RunReport, SlotReport, SlotStatus, StopCause, Supervisor, SupervisorBuilder,
    SupervisorConfig, cancel_on_signal, wait_for_shutdown_signal,
};
pub use error::{FaninError, SpawnError, SupervisorError};
pub use events::{Bus, Event, EventKind};
pub use process::{TerminationReason, WorkerCommand};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
