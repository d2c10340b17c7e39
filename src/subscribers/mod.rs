//! # Event subscribers for the procvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out,
//! and built-in implementations for handling runtime events.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   event loop ── publish(Event) ──┬──► Bus (broadcast, external receivers)
//!                                  └──► SubscriberSet::emit(&Event)
//!                                              │
//!                                         ┌────┴────┬─────────┐
//!                                         ▼         ▼         ▼
//!                                     LogWriter  Metrics   Custom ...
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
