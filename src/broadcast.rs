//! Change notifications for transport layers
//!
//! The ledger publishes an [`Event`] for every committed mutation while it
//! still holds its guard, so observers receive events in commit order.
//! Publishing never blocks: each observer owns a bounded queue and an
//! observer whose queue is full or whose receiver is gone is dropped.

use crate::blockchain::Block;
use crate::error::ChainError;
use crate::transaction::Transaction;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Every payload is a full state snapshot, never a delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Sent once to a new observer before any other event.
    Init {
        chain: Vec<Block>,
        pending: Vec<Transaction>,
    },
    NewBlock {
        chain: Vec<Block>,
    },
    PendingChanged {
        pending: Vec<Transaction>,
    },
    MiningDone,
    ChainReplaced {
        chain: Vec<Block>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Init { .. } => "init",
            Event::NewBlock { .. } => "new_block",
            Event::PendingChanged { .. } => "pending_changed",
            Event::MiningDone => "mining_done",
            Event::ChainReplaced { .. } => "chain_replaced",
        }
    }

    pub fn to_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Receives change notifications. Implementations must not block.
pub trait BroadcastPort: Send + Sync {
    fn publish(&self, event: Event);
}

/// Fan-out to any number of observers over bounded crossbeam queues.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<BroadcasterInner>,
}

struct BroadcasterInner {
    subscribers: Mutex<Vec<(u64, Sender<Arc<Event>>)>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Broadcaster {
    /// `capacity` is the per-observer queue length; at least 1.
    pub fn new(capacity: usize) -> Self {
        Broadcaster {
            inner: Arc::new(BroadcasterInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = bounded(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, sender));
        debug!(observer = id, "observer subscribed");
        Subscription { id, receiver }
    }

    /// Subscribes and queues `initial` ahead of anything published later.
    pub fn subscribe_with(&self, initial: Event) -> Subscription {
        let (sender, receiver) = bounded(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        // The queue is empty and has room for at least one event.
        let _ = sender.try_send(Arc::new(initial));
        self.inner.subscribers.lock().push((id, sender));
        debug!(observer = id, "observer subscribed with initial state");
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

impl BroadcastPort for Broadcaster {
    fn publish(&self, event: Event) {
        let event = Arc::new(event);
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|(id, sender)| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(observer = *id, kind = event.kind(), "observer queue full, dropping observer");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(observer = *id, "observer disconnected");
                false
            }
        });
    }
}

/// One observer's end of the fan-out. Dropping it unsubscribes lazily on the
/// next publish.
pub struct Subscription {
    id: u64,
    receiver: Receiver<Arc<Event>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn try_recv(&self) -> Option<Arc<Event>> {
        self.receiver.try_recv().ok()
    }

    /// `None` on timeout or once the observer has been dropped and drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Arc<Event>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything currently queued, without waiting.
    pub fn drain(&self) -> Vec<Arc<Event>> {
        self.receiver.try_iter().collect()
    }
}
