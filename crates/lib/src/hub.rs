//! In-memory fan-out of build log events to live subscribers.
//!
//! [`LogHub`] keeps no history: an event reaches exactly the subscribers
//! registered at publish time. Each subscriber owns a bounded delivery
//! buffer; a slow consumer loses events rather than stalling delivery to
//! everyone else. A subscriber whose receiving end is gone is pruned from
//! the registry on the next publish.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::event::LogEvent;

/// Default per-subscriber delivery buffer, in events.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// Opaque handle identifying one registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Receiving half handed out by [`LogHub::subscribe`].
#[derive(Debug)]
pub struct Subscription {
  id: SubscriberId,
  rx: mpsc::Receiver<LogEvent>,
}

impl Subscription {
  /// Handle for [`LogHub::unsubscribe`].
  pub fn id(&self) -> SubscriberId {
    self.id
  }

  /// Next event, or `None` once this subscriber has been removed from the
  /// hub and the buffer is drained.
  pub async fn recv(&mut self) -> Option<LogEvent> {
    self.rx.recv().await
  }

  /// Non-blocking variant of [`Subscription::recv`].
  pub fn try_recv(&mut self) -> Result<LogEvent, mpsc::error::TryRecvError> {
    self.rx.try_recv()
  }
}

struct Registry {
  next_id: u64,
  subscribers: HashMap<u64, mpsc::Sender<LogEvent>>,
}

/// Pub/sub hub for build log events. Cheap to clone; all clones share one
/// subscriber registry.
#[derive(Clone)]
pub struct LogHub {
  inner: Arc<Mutex<Registry>>,
  capacity: usize,
}

impl LogHub {
  /// Creates a hub with the default per-subscriber buffer.
  pub fn new() -> Self {
    Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
  }

  /// Creates a hub whose subscribers each buffer up to `capacity` events.
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Registry {
        next_id: 0,
        subscribers: HashMap::new(),
      })),
      capacity: capacity.max(1),
    }
  }

  /// Registers a new subscriber. It receives only events published after
  /// this call returns.
  pub fn subscribe(&self) -> Subscription {
    let (tx, rx) = mpsc::channel(self.capacity);
    let mut registry = self.lock();
    let id = registry.next_id;
    registry.next_id += 1;
    registry.subscribers.insert(id, tx);
    debug!(subscriber = id, "subscriber registered");
    Subscription {
      id: SubscriberId(id),
      rx,
    }
  }

  /// Removes a subscriber. Safe to call at any time; removing an unknown
  /// handle is a no-op. Dropping the [`Subscription`] has the same effect
  /// the next time an event is published.
  pub fn unsubscribe(&self, id: SubscriberId) {
    let mut registry = self.lock();
    if registry.subscribers.remove(&id.0).is_some() {
      debug!(subscriber = id.0, "subscriber removed");
    }
  }

  /// Delivers `event` to every currently registered subscriber without
  /// blocking. A subscriber with a full buffer loses this event; one whose
  /// receiver is gone is pruned.
  pub fn publish(&self, event: LogEvent) {
    let mut registry = self.lock();
    registry.subscribers.retain(|id, tx| match tx.try_send(event.clone()) {
      Ok(()) => true,
      Err(mpsc::error::TrySendError::Full(_)) => {
        debug!(subscriber = id, "dropping event for slow subscriber");
        true
      }
      Err(mpsc::error::TrySendError::Closed(_)) => {
        debug!(subscriber = id, "pruning closed subscriber");
        false
      }
    });
  }

  /// Number of currently registered subscribers.
  pub fn subscriber_count(&self) -> usize {
    self.lock().subscribers.len()
  }

  fn lock(&self) -> MutexGuard<'_, Registry> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Default for LogHub {
  fn default() -> Self {
    Self::new()
  }
}
