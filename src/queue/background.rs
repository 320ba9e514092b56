//! Event queue drained by one background thread.

use super::{run_entry, Counters, Entry, EventQueue, QueueStats};
use crate::core::config::QueueConfig;
use crate::core::{Result, StatsError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

static GLOBAL_QUEUE: OnceCell<Arc<BackgroundQueue>> = OnceCell::new();

enum Message {
    Entry(Box<dyn Entry>),
    #[cfg(test)]
    Flush(Sender<()>),
}

/// Bounded MPSC channel with a single consumer thread.
///
/// Closing drops the sending half, so every entry accepted before
/// [`BackgroundQueue::shutdown`] is still processed and nothing is accepted
/// after it.
///
/// An entry must not enqueue into the queue running it: with a full buffer
/// the consumer would wait on itself.
pub struct BackgroundQueue {
    sender: RwLock<Option<Sender<Message>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    done: Receiver<()>,
    counters: Arc<Counters>,
    capacity: usize,
    shutdown_timeout: Duration,
}

impl BackgroundQueue {
    /// Starts a queue and its consumer thread
    pub fn new(config: &QueueConfig) -> Result<Self> {
        let (sender, receiver) = bounded(config.capacity);
        let (done_tx, done) = bounded(1);
        let counters = Arc::new(Counters::default());

        let consumer_counters = Arc::clone(&counters);
        let handle = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || consume(&receiver, &consumer_counters, &done_tx))?;

        tracing::info!(
            capacity = config.capacity,
            thread = %config.thread_name,
            "Stats event queue started"
        );

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            consumer: Mutex::new(Some(handle)),
            done,
            counters,
            capacity: config.capacity,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Process-wide queue, started on first use and never shut down.
    ///
    /// # Panics
    ///
    /// Panics if the consumer thread cannot be spawned; see [`BackgroundQueue::try_global`].
    pub fn global() -> Arc<BackgroundQueue> {
        Self::try_global().expect("Failed to start the global stats consumer thread")
    }

    /// Process-wide queue; a failed start is returned and retried on the next call
    pub fn try_global() -> Result<Arc<BackgroundQueue>> {
        GLOBAL_QUEUE
            .get_or_try_init(|| BackgroundQueue::new(&QueueConfig::default()).map(Arc::new))
            .map(Arc::clone)
    }

    /// Returns true once `shutdown` has been called
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Stops accepting entries, waits for the consumer to drain and joins it.
    ///
    /// Calling it again is a no-op.
    pub fn shutdown(&self) -> Result<()> {
        let Some(sender) = self.sender.write().take() else {
            return Ok(());
        };
        drop(sender);

        match self.done.recv_timeout(self.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {},
            Err(RecvTimeoutError::Timeout) => {
                let stats = self.stats();
                tracing::warn!(
                    pending = stats.pending,
                    "Stats consumer did not drain within {:?}",
                    self.shutdown_timeout
                );
                return Err(StatsError::Timeout {
                    timeout_ms: u64::try_from(self.shutdown_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                });
            },
        }

        if let Some(handle) = self.consumer.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Stats consumer thread terminated abnormally");
            }
        }

        let stats = self.stats();
        tracing::info!(
            processed = stats.processed,
            failed = stats.failed,
            "Stats event queue stopped"
        );
        Ok(())
    }

    /// Blocks until every entry enqueued before the call has been processed
    #[cfg(test)]
    pub(crate) fn flush(&self) {
        let (ack_tx, ack_rx) = bounded(1);
        let sent = match self.sender.read().as_ref() {
            Some(sender) => sender.send(Message::Flush(ack_tx)).is_ok(),
            None => false,
        };
        if sent {
            let _ = ack_rx.recv();
        }
    }
}

impl EventQueue for BackgroundQueue {
    fn enqueue(&self, entry: Box<dyn Entry>) -> Result<()> {
        // Not held across a blocking send, so shutdown never waits behind a full buffer
        let sender = self
            .sender
            .read()
            .as_ref()
            .cloned()
            .ok_or(StatsError::QueueClosed)?;
        sender
            .send(Message::Entry(entry))
            .map_err(|_| StatsError::QueueClosed)?;
        self.counters.record_enqueued();
        Ok(())
    }

    fn stats(&self) -> QueueStats {
        self.counters.snapshot(Some(self.capacity))
    }
}

impl Drop for BackgroundQueue {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("Stats event queue shutdown failed: {}", e);
        }
    }
}

fn consume(receiver: &Receiver<Message>, counters: &Counters, done: &Sender<()>) {
    for message in receiver.iter() {
        match message {
            Message::Entry(entry) => run_entry(entry, counters),
            #[cfg(test)]
            Message::Flush(ack) => {
                let _ = ack.send(());
            },
        }
    }
    let _ = done.send(());
}
