//! End-to-end tests of the recording pipeline.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use vista_lib::core::{ManualClock, MeasurementMap, StatsError, Tags};
use vista_lib::queue::{entry_fn, EventQueue, SynchronousQueue};
use vista_lib::stats::{presets, StatsManager, ViewSnapshot};

#[test]
fn test_preset_latency_end_to_end() {
    let queue = test_queue(1024);
    let manager = StatsManager::with_queue(Arc::clone(&queue) as Arc<dyn EventQueue>);
    let view_descriptor = presets::rpc_client_roundtrip_latency_view();
    manager.register_view(view_descriptor).unwrap();

    let tags = Tags::from_pairs([(presets::RPC_METHOD, "GetUser")]).unwrap();
    for value in [12.0, 3.5, 700.0] {
        manager
            .record(
                tags.clone(),
                MeasurementMap::of(presets::rpc_client_roundtrip_latency(), value),
            )
            .unwrap();
    }
    queue.shutdown().unwrap();

    let view = manager.get_view(view_descriptor).unwrap();
    let dist = view.as_distribution().unwrap().distribution_for(&tags).unwrap();
    assert_eq!(dist.count, 3);
    assert_eq!(dist.min, Some(3.5));
    assert_eq!(dist.max, Some(700.0));
    assert_eq!(dist.buckets.iter().map(|b| b.count).sum::<u64>(), 3);
}

#[test]
fn test_distribution_and_interval_on_same_measurement() {
    let queue = test_queue(1024);
    let manager = declared_manager(Arc::clone(&queue));
    manager.register_view(&latency_distribution()).unwrap();
    manager.register_view(&latency_interval()).unwrap();

    for (m, value) in [("GET", 120.0), ("GET", 200.0), ("POST", 80.0)] {
        manager
            .record(method(m), MeasurementMap::of(&latency_ms(), value))
            .unwrap();
    }
    queue.shutdown().unwrap();

    let snapshots = manager.snapshots();
    assert_eq!(snapshots.len(), 2);

    match &snapshots[0] {
        ViewSnapshot::Distribution(view) => {
            assert_eq!(view.view, "latency_ms.distribution");
            assert_eq!(view.groups.len(), 2);
            let get = &view.groups[0];
            assert_eq!(get.tags, method("GET"));
            assert_eq!(get.aggregate.count, 2);
            assert_eq!(get.aggregate.sum, 320.0);
        },
        other => panic!("expected distribution, got {:?}", other),
    }
    match &snapshots[1] {
        ViewSnapshot::Interval(view) => {
            assert_eq!(view.groups.len(), 1);
            assert_eq!(view.groups[0].aggregate.windows[0].count, 3);
            assert_eq!(view.groups[0].aggregate.windows[0].sum, 400.0);
        },
        other => panic!("expected interval, got {:?}", other),
    }
}

#[test]
fn test_concurrent_producers_lose_nothing() {
    const PRODUCERS: usize = 8;
    const SAMPLES: usize = 500;

    // Small buffer so producers block on a full queue
    let queue = test_queue(4);
    let manager = Arc::new(declared_manager(Arc::clone(&queue)));
    manager.register_view(&latency_distribution()).unwrap();

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let tags = method(if p % 2 == 0 { "GET" } else { "POST" });
                for i in 0..SAMPLES {
                    manager
                        .record(tags.clone(), MeasurementMap::of(&latency_ms(), i as f64))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    queue.shutdown().unwrap();

    let view = manager.get_view(&latency_distribution()).unwrap();
    let dist = view.as_distribution().unwrap();
    assert_eq!(dist.total_count(), (PRODUCERS * SAMPLES) as u64);
    assert_eq!(
        dist.distribution_for(&method("GET")).unwrap().count,
        (PRODUCERS / 2 * SAMPLES) as u64
    );

    let stats = manager.queue_stats();
    assert_eq!(stats.processed, (PRODUCERS * SAMPLES) as u64);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.failed, 0);
}

#[test]
fn test_entries_run_in_submission_order() {
    let queue = test_queue(2);
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    for i in 0..100 {
        let seen = Arc::clone(&seen);
        queue
            .enqueue(entry_fn(move || {
                seen.lock().push(i);
                Ok(())
            }))
            .unwrap();
    }
    queue.shutdown().unwrap();

    assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
}

#[test]
fn test_failures_do_not_stop_the_consumer() {
    let queue = test_queue(16);
    let manager = declared_manager(Arc::clone(&queue));
    manager.register_view(&latency_distribution()).unwrap();
    let after = Arc::new(AtomicUsize::new(0));

    queue
        .enqueue(entry_fn(|| Err(StatsError::config("boom"))))
        .unwrap();
    queue.enqueue(entry_fn(|| panic!("entry panicked"))).unwrap();
    manager
        .record(method("GET"), MeasurementMap::of(&latency_ms(), f64::INFINITY))
        .unwrap();
    manager
        .record(method("GET"), MeasurementMap::of(&latency_ms(), 42.0))
        .unwrap();
    let counter = Arc::clone(&after);
    queue
        .enqueue(entry_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
    queue.shutdown().unwrap();

    assert_eq!(after.load(Ordering::SeqCst), 1);
    let stats = queue.stats();
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.processed, 5);

    let view = manager.get_view(&latency_distribution()).unwrap();
    let dist = view.as_distribution().unwrap().distribution_for(&method("GET")).unwrap();
    assert_eq!(dist.count, 1);
    assert_eq!(dist.sum, 42.0);
}

#[test]
fn test_record_after_shutdown_is_rejected() {
    let queue = test_queue(16);
    let manager = declared_manager(Arc::clone(&queue));
    manager.register_view(&latency_distribution()).unwrap();
    queue.shutdown().unwrap();
    assert!(queue.is_closed());

    let result = manager.record(method("GET"), MeasurementMap::of(&latency_ms(), 1.0));
    assert!(matches!(result, Err(StatsError::QueueClosed)));
    // Second shutdown is a no-op
    assert!(queue.shutdown().is_ok());
}

#[test]
fn test_unregistered_measurement_and_empty_map() {
    let manager = StatsManager::with_queue(Arc::new(SynchronousQueue::new()));
    manager
        .register_view(presets::rpc_client_roundtrip_latency_view())
        .unwrap();

    manager.record(Tags::new(), MeasurementMap::default()).unwrap();
    manager
        .record(Tags::new(), MeasurementMap::of(&latency_ms(), 5.0))
        .unwrap();

    let view = manager
        .get_view(presets::rpc_client_roundtrip_latency_view())
        .unwrap();
    assert_eq!(view.as_distribution().unwrap().total_count(), 0);
    assert_eq!(manager.queue_stats().processed, 2);
    assert_eq!(manager.queue_stats().capacity, None);
}

#[test]
fn test_view_start_and_interval_expiry_follow_clock() {
    let clock = Arc::new(ManualClock::default());
    let start = vista_lib::core::Clock::now(clock.as_ref());
    let manager = StatsManager::from_config(
        &vista_lib::core::ConfigBuilder::new()
            .policy(vista_lib::core::RegistrationPolicy::Declared)
            .measurement(latency_ms())
            .build()
            .unwrap(),
        Arc::new(SynchronousQueue::new()),
    )
    .unwrap()
    .with_clock(Arc::clone(&clock) as Arc<dyn vista_lib::core::Clock>);
    manager.register_view(&latency_interval()).unwrap();

    manager
        .record(Tags::new(), MeasurementMap::of(&latency_ms(), 1.0))
        .unwrap();
    clock.set(start + Duration::from_secs(120));
    manager
        .record(Tags::new(), MeasurementMap::of(&latency_ms(), 2.0))
        .unwrap();

    let view = manager.get_view(&latency_interval()).unwrap();
    assert_eq!(view.start(), start);
    match &manager.snapshots()[0] {
        ViewSnapshot::Interval(snapshot) => {
            let window = &snapshot.groups[0].aggregate.windows[0];
            assert_eq!(window.count, 1);
            assert_eq!(window.sum, 2.0);
        },
        other => panic!("expected interval, got {:?}", other),
    }
}

#[test]
fn test_past_records_are_not_applied_to_new_views() {
    let queue = test_queue(16);
    let manager = declared_manager(Arc::clone(&queue));

    // Keep the consumer busy so the record is still queued when the view appears
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    queue
        .enqueue(entry_fn(move || {
            let _ = release_rx.recv();
            Ok(())
        }))
        .unwrap();

    manager
        .record(method("GET"), MeasurementMap::of(&latency_ms(), 120.0))
        .unwrap();
    manager.register_view(&latency_distribution()).unwrap();
    release_tx.send(()).unwrap();
    queue.shutdown().unwrap();

    let view = manager.get_view(&latency_distribution()).unwrap();
    assert_eq!(view.as_distribution().unwrap().total_count(), 0);
    assert_eq!(view.as_distribution().unwrap().distribution_for(&method("GET")), None);
    assert_eq!(queue.stats().processed, 2);
    assert_eq!(queue.stats().failed, 0);
}
