//! Single-consumer event queue.
//!
//! Producers hand opaque [`Entry`] values to an [`EventQueue`]; exactly one
//! consumer runs them, one at a time, in global submission order. Aggregation
//! state is only ever mutated from inside `Entry::process`, so it has a single
//! writer.
//!
//! A failing entry never stops the consumer. Rejected input (see
//! [`StatsError::is_async`](crate::core::StatsError::is_async)) is logged with
//! `tracing::warn!`; other errors and caught panics are logged with
//! `tracing::error!`. All of them are counted in [`QueueStats::failed`].

pub mod background;
pub mod inline;

pub use background::BackgroundQueue;
pub use inline::SynchronousQueue;

use crate::core::Result;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

/// A unit of work executed by the queue consumer
pub trait Entry: Send + 'static {
    /// Applies the entry. Runs on the consumer, never concurrently with another entry.
    fn process(self: Box<Self>) -> Result<()>;
}

/// Multi-producer, single-consumer delivery of entries
pub trait EventQueue: Send + Sync {
    /// Hands an entry to the consumer. Blocks while the buffer is full, never drops.
    fn enqueue(&self, entry: Box<dyn Entry>) -> Result<()>;

    /// Current counters
    fn stats(&self) -> QueueStats;
}

/// Entry wrapping a closure
pub struct FnEntry<F>(F);

impl<F> Entry for FnEntry<F>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    fn process(self: Box<Self>) -> Result<()> {
        (self.0)()
    }
}

/// Boxes a closure as an [`Entry`]
pub fn entry_fn<F>(f: F) -> Box<dyn Entry>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    Box::new(FnEntry(f))
}

/// Queue counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Buffer size, `None` when entries run inline
    pub capacity: Option<usize>,
    /// Entries accepted but not yet finished
    pub pending: u64,
    /// Entries accepted
    pub enqueued: u64,
    /// Entries finished, successfully or not
    pub processed: u64,
    /// Entries that returned an error or panicked
    pub failed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    enqueued: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, capacity: Option<usize>) -> QueueStats {
        let processed = self.processed.load(Ordering::Acquire);
        let enqueued = self.enqueued.load(Ordering::Acquire);
        QueueStats {
            capacity,
            pending: enqueued.saturating_sub(processed),
            enqueued,
            processed,
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Runs one entry, isolating errors and panics from the caller
pub(crate) fn run_entry(entry: Box<dyn Entry>, counters: &Counters) {
    match panic::catch_unwind(AssertUnwindSafe(move || entry.process())) {
        Ok(Ok(())) => {},
        Ok(Err(e)) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            if e.is_async() {
                // Bad input from a producer that has already moved on
                tracing::warn!(category = e.category(), "Dropped stats entry: {}", e);
            } else {
                tracing::error!(category = e.category(), "Failed to process stats entry: {}", e);
            }
        },
        Err(payload) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!("Stats entry panicked: {}", panic_message(payload.as_ref()));
        },
    }
    counters.processed.fetch_add(1, Ordering::Release);
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
