//! Common test utilities and fixtures.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use vista_lib::core::config::{ConfigBuilder, QueueConfig, RegistrationPolicy};
use vista_lib::core::{
    AggregationDescriptor, MeasurementDescriptor, MeasurementUnit, TagKey, Tags, ViewDescriptor,
};
use vista_lib::queue::{BackgroundQueue, EventQueue};
use vista_lib::stats::StatsManager;

/// Millisecond latency measurement used across tests
pub fn latency_ms() -> MeasurementDescriptor {
    MeasurementDescriptor::new("latency_ms", "Request latency", MeasurementUnit::millis())
}

/// Distribution over `latency_ms` grouped by method
pub fn latency_distribution() -> ViewDescriptor {
    ViewDescriptor::new(
        "latency_ms.distribution",
        "Latency distribution",
        latency_ms(),
        AggregationDescriptor::distribution(vec![100.0, 150.0]),
        vec![TagKey::new("method").unwrap()],
    )
}

/// One-minute interval over `latency_ms`
pub fn latency_interval() -> ViewDescriptor {
    ViewDescriptor::new(
        "latency_ms.minute",
        "Latency over the last minute",
        latency_ms(),
        AggregationDescriptor::interval(vec![Duration::from_secs(60)]),
        Vec::new(),
    )
}

pub fn method(name: &str) -> Tags {
    Tags::from_pairs([("method", name)]).unwrap()
}

/// Background queue owned by the test, small enough to exercise back-pressure
pub fn test_queue(capacity: usize) -> Arc<BackgroundQueue> {
    let config = QueueConfig {
        capacity,
        thread_name: "vista-test-consumer".to_string(),
        ..QueueConfig::default()
    };
    Arc::new(BackgroundQueue::new(&config).unwrap())
}

/// Manager accepting views over `latency_ms`
pub fn declared_manager(queue: Arc<BackgroundQueue>) -> StatsManager {
    let config = ConfigBuilder::new()
        .policy(RegistrationPolicy::Declared)
        .measurement(latency_ms())
        .build()
        .unwrap();
    StatsManager::from_config(&config, queue as Arc<dyn EventQueue>).unwrap()
}
