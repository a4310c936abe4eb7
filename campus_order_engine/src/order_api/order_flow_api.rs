use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{NewNotification, NewOrder, Order, OrderId, OrderStatus},
    events::{
        ChangeFeed,
        EventProducers,
        OrderChangeEvent,
        OrderPlacedEvent,
        OrderStatusChangedEvent,
        SubscriptionScope,
    },
    traits::{OrderFlowError, OrderStoreDatabase},
    views::{LeftActiveHandler, LiveOrderView},
};

/// `OrderFlowApi` is the primary API for the order lifecycle: placing orders, vendor-authorized status transitions,
/// student cancellations and the administrative stale-order sweep.
///
/// It is the only component that writes order status, so every committed change flows out of here exactly once:
/// a notification record for the counterpart role (best effort), a change event into the realtime feed, and the
/// registered lifecycle hooks.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    feed: ChangeFeed,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, feed: ChangeFeed::default() }
    }

    /// The realtime feed this API publishes into. Clones share the subscriber table.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

impl<B> OrderFlowApi<B>
where B: OrderStoreDatabase
{
    /// Places a new order in `Pending` status.
    ///
    /// The total is fixed here as the sum of the line totals plus the delivery fee. A `NewOrder` notification is
    /// written for the vendor, an insert event goes out on the feed, and the order-placed hook fires.
    ///
    /// Placing an order whose id already exists returns [`OrderFlowError::OrderAlreadyExists`].
    pub async fn place_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        let (stored, inserted) = self.db.insert_order(order).await?;
        if !inserted {
            return Err(OrderFlowError::OrderAlreadyExists(stored.order_id));
        }
        debug!(
            "🍜️📦️ Order {} placed by {} at vendor {} for {}",
            stored.order_id, stored.student_id, stored.vendor_id, stored.total_amount
        );
        self.notify(NewNotification::new_order(&stored.vendor_id, &stored)).await;
        self.feed.publish(OrderChangeEvent::inserted(stored.clone())).await;
        self.call_order_placed_hook(&stored).await;
        Ok(stored)
    }

    /// Moves an order to `new_status` on behalf of the owning vendor, reading the current status first.
    ///
    /// This is the convenience form for "mark as next" style UIs; callers that already hold a snapshot of the order
    /// should use [`Self::transition_from`] with the status they observed so that a concurrent change surfaces as
    /// [`OrderFlowError::StatusConflict`] instead of being applied on top of someone else's transition.
    pub async fn transition(
        &self,
        order_id: &OrderId,
        new_status: OrderStatus,
        vendor_id: &str,
    ) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        self.transition_from(order_id, order.status, new_status, vendor_id).await
    }

    /// Moves an order from `expected_current` to `new_status`, on behalf of the owning vendor.
    ///
    /// Checks are made in this order:
    /// * the order must exist ([`OrderFlowError::OrderNotFound`]),
    /// * `vendor_id` must own it ([`OrderFlowError::Forbidden`]),
    /// * `new_status` must be a direct successor of `expected_current` in the status state machine
    ///   ([`OrderFlowError::InvalidTransition`]),
    /// * and the stored status must still equal `expected_current` when the write lands
    ///   ([`OrderFlowError::StatusConflict`]). Exactly one of two racing callers wins; the loser must re-fetch.
    ///
    /// Entering `Delivering` or `Delivered` refreshes the delivery estimate in the same write. After the write
    /// commits, an `OrderUpdate` notification is stored for the student (best effort: a failure there is logged and
    /// swallowed, the transition stands), followed by an update event on the feed and the status-changed hook.
    pub async fn transition_from(
        &self,
        order_id: &OrderId,
        expected_current: OrderStatus,
        new_status: OrderStatus,
        vendor_id: &str,
    ) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if order.vendor_id != vendor_id {
            return Err(OrderFlowError::Forbidden(format!("vendor {vendor_id} does not own order {order_id}")));
        }
        if !expected_current.can_transition_to(new_status) {
            return Err(OrderFlowError::InvalidTransition { from: expected_current, to: new_status });
        }
        let eta = refreshed_estimate(new_status);
        let updated = self.db.update_order_status(order_id, expected_current, new_status, eta).await?;
        debug!("🍜️🔄️ Order {order_id} moved {expected_current} → {new_status} by vendor {vendor_id}");
        self.notify(NewNotification::order_update(&updated.student_id, &updated)).await;
        self.feed.publish(OrderChangeEvent::updated(updated.clone())).await;
        self.call_status_changed_hook(&updated, expected_current).await;
        Ok(updated)
    }

    /// Cancels an order on behalf of the student who placed it.
    ///
    /// Cancellation is only possible while the order has not gone out for delivery (`Pending`, `Preparing`,
    /// `Prepared`). The vendor is notified; the same conditional-write rules as [`Self::transition_from`] apply.
    pub async fn cancel_order(&self, order_id: &OrderId, student_id: &str) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if order.student_id != student_id {
            return Err(OrderFlowError::Forbidden(format!("student {student_id} does not own order {order_id}")));
        }
        let current = order.status;
        if !current.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrderFlowError::InvalidTransition { from: current, to: OrderStatus::Cancelled });
        }
        let updated = self.db.update_order_status(order_id, current, OrderStatus::Cancelled, None).await?;
        debug!("🍜️❌️ Order {order_id} cancelled by student {student_id}");
        self.notify(NewNotification::order_update(&updated.vendor_id, &updated)).await;
        self.feed.publish(OrderChangeEvent::updated(updated.clone())).await;
        self.call_status_changed_hook(&updated, current).await;
        Ok(updated)
    }

    /// Force-moves every order stuck in a pre-delivery status for longer than `threshold` into `Delivered`.
    ///
    /// This is the administrative reaper entry point; it bypasses the per-edge validation that
    /// [`Self::transition_from`] enforces and must not be reachable from end-user roles. Affected orders are pushed
    /// onto the feed as updates so live views converge. Idempotent: a second immediate run matches nothing.
    ///
    /// Returns the orders that were reaped.
    pub async fn reap_stale_orders(&self, threshold: Duration) -> Result<Vec<Order>, OrderFlowError> {
        let cutoff = Utc::now() - threshold;
        let reaped = self.db.reap_stale_orders(cutoff).await?;
        if reaped.is_empty() {
            trace!("🍜️🧹️ Reaper sweep found nothing older than {cutoff}");
        } else {
            info!("🍜️🧹️ Reaper force-delivered {} stale order(s)", reaped.len());
        }
        for order in &reaped {
            self.feed.publish(OrderChangeEvent::updated(order.clone())).await;
        }
        Ok(reaped)
    }

    /// Unconditionally removes an order, bypassing the status state machine. Administrative cleanup only; it must
    /// not be reachable from end-user roles.
    ///
    /// Subscribers receive a delete event carrying the last-known row. Returns the deleted row, or `None` if the
    /// order did not exist.
    pub async fn delete_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let deleted = self.db.delete_order(order_id).await?;
        if let Some(order) = &deleted {
            info!("🍜️🗑️ Order {order_id} deleted by an administrator");
            self.feed.publish(OrderChangeEvent::deleted(order.clone())).await;
        }
        Ok(deleted)
    }

    /// A live, reconciled view of one order, e.g. the student's tracking screen.
    pub async fn subscribe_order(&self, order_id: &OrderId) -> Result<LiveOrderView, OrderFlowError> {
        LiveOrderView::spawn(&self.db, &self.feed, SubscriptionScope::order(order_id.clone()), false, None).await
    }

    /// A live view of a vendor's active (non-terminal) orders, optionally narrowed to one shop.
    ///
    /// `on_left_active` fires once for each order that leaves the active set (delivered, cancelled or reaped);
    /// vendor UIs use it to refresh aggregate counters.
    pub async fn subscribe_vendor_active_orders(
        &self,
        vendor_id: &str,
        shop_id: Option<&str>,
        on_left_active: Option<LeftActiveHandler>,
    ) -> Result<LiveOrderView, OrderFlowError> {
        let scope = match shop_id {
            Some(shop) => SubscriptionScope::vendor_shop(vendor_id, shop),
            None => SubscriptionScope::vendor(vendor_id),
        };
        LiveOrderView::spawn(&self.db, &self.feed, scope, true, on_left_active).await
    }

    /// The unscoped public community feed.
    pub async fn subscribe_public_feed(&self) -> Result<LiveOrderView, OrderFlowError> {
        LiveOrderView::spawn(&self.db, &self.feed, SubscriptionScope::All, false, None).await
    }

    async fn call_order_placed_hook(&self, order: &Order) {
        for emitter in &self.producers.order_placed_producer {
            trace!("🍜️🪝️ Notifying order placed hook subscribers");
            emitter.publish_event(OrderPlacedEvent::new(order.clone())).await;
        }
    }

    async fn call_status_changed_hook(&self, order: &Order, previous: OrderStatus) {
        for emitter in &self.producers.status_changed_producer {
            trace!("🍜️🪝️ Notifying status changed hook subscribers");
            emitter.publish_event(OrderStatusChangedEvent::new(order.clone(), previous)).await;
        }
    }

    /// Notification writes are best effort: the status write has already committed, so a store error here is logged
    /// and swallowed rather than failing the transition.
    async fn notify(&self, notification: NewNotification) {
        if let Err(e) = self.db.insert_notification(notification).await {
            warn!("🍜️📨️ Notification write failed after the order write committed. Continuing: {e}");
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

/// The delivery estimate shown to students, refreshed when an order goes out for delivery.
fn refreshed_estimate(status: OrderStatus) -> Option<String> {
    match status {
        OrderStatus::Delivering => Some("20-30 minutes".to_string()),
        OrderStatus::Delivered => Some("Delivered".to_string()),
        _ => None,
    }
}
