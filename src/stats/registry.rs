//! Registry of live views, keyed by measurement name and by view name.
//!
//! Reads go through an [`ArcSwap`] snapshot and never block. Writes build a
//! new snapshot with `rcu`, so a concurrent `record` sees either the old or
//! the new set of views, never a partial one.
//!
//! A record is resolved against the [`ViewSet`] published when it was made,
//! so views registered afterwards never see it.

use crate::core::types::{MeasurementMap, Tags, ViewDescriptor};
use crate::core::{Result, StatsError};
use crate::stats::view::View;
use ahash::AHashMap;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::SystemTime;

/// Immutable set of views published by a [`ViewRegistry`]
#[derive(Debug, Default, Clone)]
pub struct ViewSet {
    by_measurement: AHashMap<String, Vec<Arc<View>>>,
    by_name: AHashMap<String, Arc<View>>,
}

impl ViewSet {
    /// Applies every value in `measurements` to the views of its measurement.
    ///
    /// A non-finite value rejects the whole map before any view is touched.
    /// Values for measurements without views are dropped.
    pub fn record(&self, tags: &Tags, measurements: &MeasurementMap, at: SystemTime) -> Result<()> {
        if let Some(bad) = measurements.iter().find(|m| !m.value.is_finite()) {
            return Err(StatsError::InvalidMeasurement {
                name: bad.descriptor.name().to_string(),
                value: bad.value,
            });
        }

        for measurement in measurements {
            let name = measurement.descriptor.name();
            match self.by_measurement.get(name) {
                Some(views) => {
                    for view in views {
                        view.record(tags, measurement.value, at);
                    }
                },
                None => tracing::trace!(measurement = name, "No views for measurement"),
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Views indexed for lookup by descriptor and for dispatch by measurement
#[derive(Debug)]
pub struct ViewRegistry {
    snapshot: ArcSwap<ViewSet>,
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(ViewSet::default()),
        }
    }

    /// Adds `view` under `measurement_name`.
    ///
    /// Callers must make sure no view with the same name is registered yet;
    /// [`StatsManager`](crate::stats::StatsManager) serializes that check.
    pub fn put_view(&self, measurement_name: &str, view: Arc<View>) {
        self.snapshot.rcu(|current| {
            let mut next = ViewSet::clone(current);
            next.by_measurement
                .entry(measurement_name.to_string())
                .or_default()
                .push(Arc::clone(&view));
            next.by_name
                .insert(view.descriptor().name().to_string(), Arc::clone(&view));
            next
        });
    }

    /// Returns the view registered for exactly this descriptor
    pub fn get_view(&self, descriptor: &ViewDescriptor) -> Option<Arc<View>> {
        self.snapshot
            .load()
            .by_name
            .get(descriptor.name())
            .filter(|view| view.descriptor() == descriptor)
            .map(Arc::clone)
    }

    /// Returns the view registered under `name`, whatever its descriptor
    pub(crate) fn view_named(&self, name: &str) -> Option<Arc<View>> {
        self.snapshot.load().by_name.get(name).map(Arc::clone)
    }

    /// The set of views registered right now
    pub fn published(&self) -> Arc<ViewSet> {
        self.snapshot.load_full()
    }

    /// Applies `measurements` to the views registered right now
    pub fn record(&self, tags: &Tags, measurements: &MeasurementMap, at: SystemTime) -> Result<()> {
        self.snapshot.load().record(tags, measurements, at)
    }

    /// All registered views, ordered by name
    pub fn views(&self) -> Vec<Arc<View>> {
        let mut views: Vec<_> = self.snapshot.load().by_name.values().map(Arc::clone).collect();
        views.sort_by(|a, b| a.descriptor().name().cmp(b.descriptor().name()));
        views
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
