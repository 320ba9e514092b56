//! Event queue that applies entries on the producer's thread.
//!
//! Entries still run one at a time: producers take turns on a mutex, which
//! keeps aggregation single-writer. `record` has fully applied by the time it
//! returns, which makes assertions deterministic.
//!
//! An entry must not enqueue into the same `SynchronousQueue`; the mutex is
//! not reentrant.

use super::{run_entry, Counters, Entry, EventQueue, QueueStats};
use crate::core::Result;
use parking_lot::Mutex;

/// Inline, serialized event queue
#[derive(Debug, Default)]
pub struct SynchronousQueue {
    writer: Mutex<()>,
    counters: Counters,
}

impl SynchronousQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventQueue for SynchronousQueue {
    fn enqueue(&self, entry: Box<dyn Entry>) -> Result<()> {
        let _turn = self.writer.lock();
        self.counters.record_enqueued();
        run_entry(entry, &self.counters);
        Ok(())
    }

    fn stats(&self) -> QueueStats {
        self.counters.snapshot(None)
    }
}
