//! The event bus (spec §4.6): one broadcast point, one independent bounded
//! buffer per subscriber, drop-on-overflow, publish never blocks.
//!
//! Grounded on the channel-based producer/consumer decoupling the teacher
//! project uses for its own watcher-to-index pipeline (`mcp/watcher.rs`'s
//! `std::sync::mpsc::channel` + dedicated thread), generalized here into a
//! fan-out registry so an arbitrary number of subscribers can each hold an
//! independent cursor. The "cyclic subscriber/bus references" design note
//! (spec §9) is resolved the way it suggests: a subscription owns its
//! receiver and only keeps a `Weak` handle plus a registration id, so
//! dropping every `Subscription` lets the bus itself be dropped too.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::model::FileEvent;

struct Registry {
    subscribers: Mutex<HashMap<u64, SyncSender<FileEvent>>>,
    next_id: AtomicU64,
    capacity: usize,
}

/// Shared broadcast point. Cheap to clone (`Arc`-backed); `subscribe`
/// hands out an independent, cancellable `Subscription`.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Registry>,
}

impl EventBus {
    /// `capacity` is the per-subscriber buffer size (spec §4.6 target: ≥ 100).
    pub fn new(capacity: usize) -> Self {
        EventBus {
            inner: Arc::new(Registry {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Attach a new subscriber. Per contract (a), it receives only events
    /// published at or after this call — there is no replay.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = sync_channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
            rx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Publish `event` to every live subscriber. Never blocks: a subscriber
    /// whose buffer is full simply does not receive this event (contract c).
    /// Subscribers whose receiver has been dropped are pruned.
    pub fn publish(&self, event: FileEvent) {
        let mut subs = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subs.retain(|_, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("subscriber buffer full, dropping event for it");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Tear down every live subscriber. Each subscriber's sender is dropped,
    /// so its `Subscription::next()` observes a disconnected channel and
    /// returns `None` the next time it's polled — used by `Engine::close`.
    pub fn shutdown(&self) {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// A live, cancellable subscription to the bus. Implements `Iterator` so it
/// reads as the "lazy, infinite sequence" spec §4.6/§4.7 describe: `next()`
/// blocks until an event arrives, the bus is torn down, or the subscription
/// is cancelled.
pub struct Subscription {
    id: u64,
    bus: Weak<Registry>,
    rx: Receiver<FileEvent>,
    cancelled: Arc<AtomicBool>,
}

impl Subscription {
    /// Cancel this subscription. Idempotent. After this call no further
    /// events are delivered and any events already buffered for this
    /// subscriber are discarded (contract d).
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.bus.upgrade() {
            registry
                .subscribers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&self.id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Iterator for Subscription {
    type Item = FileEvent;

    fn next(&mut self) -> Option<FileEvent> {
        if self.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        self.rx.recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
