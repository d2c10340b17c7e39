//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the supervisor event loop
//! and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor` (slot lifecycle, data path, runtime),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the `SubscriberSet` (fed directly by the supervisor) and any
//!   receiver obtained through [`Supervisor::bus`](crate::Supervisor::bus).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
