use std::sync::Arc;

use super::{config::SupervisorConfig, supervisor::Supervisor};
use crate::{events::Bus, subscribers::Subscribe};

/// Builder for constructing a [`Supervisor`] with optional subscribers.
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (worker lifecycle, dropped lines, etc.)
    /// through dedicated workers with bounded queues, started when the
    /// supervisor runs.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds a single subscriber.
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the Supervisor.
    ///
    /// Creates the event bus so receivers can attach before the pool starts.
    /// Does not need a runtime.
    pub fn build(self) -> Supervisor {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        Supervisor::new_internal(self.cfg, bus, self.subscribers)
    }
}
