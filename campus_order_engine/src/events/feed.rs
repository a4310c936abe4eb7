//! The realtime fan-out feed.
//!
//! Every committed order change is published once into the [`ChangeFeed`], which delivers it to every live
//! subscriber whose [`SubscriptionScope`] matches the changed row. Subscribers are registered under a process-unique
//! [`SubscriptionId`], so two views watching the same scope (two tabs, a remount) never collide. Events for the same
//! order arrive at a given subscriber in commit order; there is no ordering promise across different orders.
//!
//! The feed does not replay: a subscription only sees events published after it was registered. Callers that need a
//! complete picture must fetch current state when they (re)subscribe, which is what [`crate::views::LiveOrderView`]
//! does.
use std::{
    collections::HashMap,
    fmt::Display,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
        MutexGuard,
    },
};

use log::*;
use tokio::sync::mpsc;

use crate::events::{OrderChangeEvent, SubscriptionScope};

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 32;

//--------------------------------------   SubscriptionId  -----------------------------------------------------------
/// Process-unique identity of one feed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct SubscriberEntry {
    scope: SubscriptionScope,
    sender: mpsc::Sender<OrderChangeEvent>,
}

//--------------------------------------     ChangeFeed    -----------------------------------------------------------
/// Fan-out registry for order change events. Cheap to clone; all clones share the same subscriber table.
#[derive(Clone)]
pub struct ChangeFeed {
    subscribers: Arc<Mutex<HashMap<SubscriptionId, SubscriberEntry>>>,
    next_id: Arc<AtomicU64>,
    buffer_size: usize,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl ChangeFeed {
    pub fn new(buffer_size: usize) -> Self {
        Self { subscribers: Arc::new(Mutex::new(HashMap::new())), next_id: Arc::new(AtomicU64::new(1)), buffer_size }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<SubscriptionId, SubscriberEntry>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a new subscription for the given scope. The returned stream unsubscribes itself when dropped.
    pub fn subscribe(&self, scope: SubscriptionScope) -> OrderEventStream {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.buffer_size);
        self.table().insert(id, SubscriberEntry { scope: scope.clone(), sender });
        debug!("📡️ New subscription {id} for scope {scope:?}");
        OrderEventStream { id, scope, receiver, feed: self.clone() }
    }

    /// Removes a subscription. Safe to call at any time, including while a publish is in flight, and calling it for
    /// an id that is already gone is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.table().remove(&id).is_some() {
            debug!("📡️ Subscription {id} removed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.table().len()
    }

    /// Delivers the event to every subscriber whose scope matches the changed row.
    ///
    /// The single publisher awaits every delivery, so events for the same order reach each subscriber in commit
    /// order. Subscribers whose receiving end has gone away are pruned here.
    pub async fn publish(&self, event: OrderChangeEvent) {
        let targets: Vec<(SubscriptionId, mpsc::Sender<OrderChangeEvent>)> = self
            .table()
            .iter()
            .filter(|(_, entry)| entry.scope.matches(&event.order))
            .map(|(id, entry)| (*id, entry.sender.clone()))
            .collect();
        trace!("📡️ Publishing {:?} for order {} to {} subscriber(s)", event.kind, event.order_id(), targets.len());
        for (id, sender) in targets {
            if sender.send(event.clone()).await.is_err() {
                trace!("📡️ Subscriber {id} went away mid-delivery; pruning");
                self.unsubscribe(id);
            }
        }
    }
}

//--------------------------------------  OrderEventStream -----------------------------------------------------------
/// The receiving end of one subscription. Dropping the stream releases the registration deterministically.
pub struct OrderEventStream {
    id: SubscriptionId,
    scope: SubscriptionScope,
    receiver: mpsc::Receiver<OrderChangeEvent>,
    feed: ChangeFeed,
}

impl OrderEventStream {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn scope(&self) -> &SubscriptionScope {
        &self.scope
    }

    /// The next matching change event, or `None` once the subscription has been removed and the buffer drained.
    pub async fn recv(&mut self) -> Option<OrderChangeEvent> {
        self.receiver.recv().await
    }
}

impl Drop for OrderEventStream {
    fn drop(&mut self) {
        self.feed.unsubscribe(self.id);
    }
}
