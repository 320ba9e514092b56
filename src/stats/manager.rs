//! Public facade over the view registry and the event queue.

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::{Config, RegistrationConfig};
use crate::core::types::{MeasurementMap, Tags, ViewDescriptor};
use crate::core::{Result, StatsError};
use crate::queue::{BackgroundQueue, Entry, EventQueue, QueueStats};
use crate::stats::registry::{ViewRegistry, ViewSet};
use crate::stats::view::{View, ViewSnapshot};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;

/// One `record` call, applied on the consumer to the views registered when it was made
struct StatsEvent {
    views: Arc<ViewSet>,
    tags: Tags,
    measurements: MeasurementMap,
    recorded_at: SystemTime,
}

impl Entry for StatsEvent {
    fn process(self: Box<Self>) -> Result<()> {
        self.views
            .record(&self.tags, &self.measurements, self.recorded_at)
    }
}

/// Registers views, looks them up and records measurements against them.
///
/// `record` returns as soon as the event is queued; views reflect it once the
/// consumer has processed it. Registration and lookup are synchronous.
pub struct StatsManager {
    queue: Arc<dyn EventQueue>,
    registry: Arc<ViewRegistry>,
    registration: RegistrationConfig,
    registration_lock: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl Default for StatsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsManager {
    /// Manager on the process-wide queue with the preset registration policy.
    ///
    /// # Panics
    ///
    /// Panics if the process-wide queue's consumer thread cannot be spawned;
    /// use [`StatsManager::try_new`] to handle that as an error.
    pub fn new() -> Self {
        Self::with_queue(BackgroundQueue::global())
    }

    /// Like [`StatsManager::new`], but returns an error if the process-wide
    /// queue cannot be started
    pub fn try_new() -> Result<Self> {
        Ok(Self::with_queue(BackgroundQueue::try_global()?))
    }

    pub fn with_queue(queue: Arc<dyn EventQueue>) -> Self {
        Self {
            queue,
            registry: Arc::new(ViewRegistry::new()),
            registration: RegistrationConfig::default(),
            registration_lock: Mutex::new(()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Manager using the configured registration policy, with the configured
    /// views already registered
    pub fn from_config(config: &Config, queue: Arc<dyn EventQueue>) -> Result<Self> {
        config.validate()?;

        let mut manager = Self::with_queue(queue);
        manager.registration = config.registration.clone();
        for view in &config.registration.views {
            manager.register_view(view)?;
        }
        Ok(manager)
    }

    /// Replaces the time source used for view start times and record timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a view for `descriptor`. Registering an equal descriptor again is a no-op.
    pub fn register_view(&self, descriptor: &ViewDescriptor) -> Result<()> {
        if !self.registration.admits(descriptor) {
            return Err(StatsError::unsupported(descriptor.to_string()));
        }
        descriptor.validate()?;

        let _guard = self.registration_lock.lock();
        if let Some(existing) = self.registry.view_named(descriptor.name()) {
            if existing.descriptor() == descriptor {
                tracing::debug!(view = descriptor.name(), "View already registered");
                return Ok(());
            }
            return Err(StatsError::ViewNameConflict(descriptor.name().to_string()));
        }

        let view = Arc::new(View::create(descriptor, self.clock.now()));
        self.registry
            .put_view(descriptor.measurement().name(), view);
        tracing::info!(
            view = descriptor.name(),
            measurement = descriptor.measurement().name(),
            kind = %descriptor.kind(),
            "Registered view"
        );
        Ok(())
    }

    /// The live view registered for `descriptor`
    pub fn get_view(&self, descriptor: &ViewDescriptor) -> Result<Arc<View>> {
        self.registry
            .get_view(descriptor)
            .ok_or_else(|| StatsError::not_found(descriptor.name()))
    }

    /// Queues `measurements` for aggregation under `tags`.
    ///
    /// Fails only when the queue no longer accepts events.
    pub fn record(&self, tags: Tags, measurements: MeasurementMap) -> Result<()> {
        let event = StatsEvent {
            views: self.registry.published(),
            tags,
            measurements,
            recorded_at: self.clock.now(),
        };
        self.queue.enqueue(Box::new(event))
    }

    /// Descriptors of every registered view, ordered by name
    pub fn registered_views(&self) -> Vec<ViewDescriptor> {
        self.registry
            .views()
            .iter()
            .map(|view| view.descriptor().clone())
            .collect()
    }

    /// Current state of every registered view, ordered by name
    pub fn snapshots(&self) -> Vec<ViewSnapshot> {
        let now = self.clock.now();
        self.registry
            .views()
            .iter()
            .map(|view| view.snapshot(now))
            .collect()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }
}

impl std::fmt::Debug for StatsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsManager")
            .field("views", &self.registry.len())
            .field("policy", &self.registration.policy)
            .field("queue", &self.queue.stats())
            .finish()
    }
}
