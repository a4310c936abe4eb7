use std::{collections::HashSet, sync::Arc};

use log::*;

use crate::{
    db_types::{Order, OrderId},
    events::{ChangeKind, OrderChangeEvent, SubscriptionScope},
};

/// Called when an order drops out of an active-orders view (delivered, cancelled or reaped). Receives the row that
/// caused the departure.
pub type LeftActiveHandler = Arc<dyn Fn(&Order) + Send + Sync>;

//--------------------------------------    ViewPredicate  -----------------------------------------------------------
/// The membership rule for one view: a subscription scope plus, for active-orders views, a "non-terminal statuses
/// only" constraint.
#[derive(Debug, Clone)]
pub struct ViewPredicate {
    pub scope: SubscriptionScope,
    pub active_only: bool,
}

impl ViewPredicate {
    pub fn new(scope: SubscriptionScope, active_only: bool) -> Self {
        Self { scope, active_only }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.scope.matches(order) && (!self.active_only || order.status.is_active())
    }
}

//-------------------------------------- OrderViewController ---------------------------------------------------------
/// A materialized, de-duplicated list of order snapshots for one UI surface.
///
/// The list is seeded from a bulk fetch and then reconciled event by event. Reconciliation is idempotent: replaying
/// an event leaves the list unchanged, and the left-active callback fires at most once per departure.
///
/// Tentative (optimistic) entries let a UI show its own pending change immediately; the next authoritative event for
/// that order id confirms them, or [`Self::rollback_tentative`] discards them.
pub struct OrderViewController {
    predicate: ViewPredicate,
    orders: Vec<Order>,
    tentative: HashSet<OrderId>,
    on_left_active: Option<LeftActiveHandler>,
}

impl OrderViewController {
    pub fn new(predicate: ViewPredicate) -> Self {
        Self { predicate, orders: Vec::new(), tentative: HashSet::new(), on_left_active: None }
    }

    pub fn with_left_active_handler(mut self, handler: LeftActiveHandler) -> Self {
        self.on_left_active = Some(handler);
        self
    }

    /// Replaces the list with a fresh bulk-fetch result, dropping rows the predicate rejects and any duplicates.
    /// Tentative state is discarded: the fetch is authoritative.
    pub fn seed(&mut self, orders: Vec<Order>) {
        self.orders.clear();
        self.tentative.clear();
        for order in orders {
            if self.predicate.matches(&order) && self.position_of(&order.order_id).is_none() {
                self.orders.push(order);
            }
        }
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn snapshot(&self) -> Vec<Order> {
        self.orders.clone()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.position_of(order_id).is_some()
    }

    /// Reconciles one change event into the list.
    ///
    /// * insert: prepend if the row matches the predicate and is not already present.
    /// * update: replace in place; remove (and fire the left-active callback) if the row no longer matches; insert
    ///   if it newly matches.
    /// * delete: remove by id if present.
    pub fn apply_event(&mut self, event: &OrderChangeEvent) {
        let order = &event.order;
        match event.kind {
            ChangeKind::Insert => {
                if self.predicate.matches(order) {
                    self.upsert(order);
                }
            },
            ChangeKind::Update => {
                if self.predicate.matches(order) {
                    self.upsert(order);
                } else if let Some(pos) = self.position_of(&order.order_id) {
                    self.orders.remove(pos);
                    self.tentative.remove(&order.order_id);
                    trace!("🖥️ Order {} left the view", order.order_id);
                    if let Some(handler) = &self.on_left_active {
                        handler(order);
                    }
                }
            },
            ChangeKind::Delete => {
                if let Some(pos) = self.position_of(&order.order_id) {
                    self.orders.remove(pos);
                    self.tentative.remove(&order.order_id);
                }
            },
        }
    }

    /// Shows a locally-initiated change before the authoritative event arrives. The entry is replaced by the next
    /// event for the same order id, or discarded by [`Self::rollback_tentative`].
    pub fn apply_tentative(&mut self, order: Order) {
        if !self.predicate.matches(&order) {
            return;
        }
        let id = order.order_id.clone();
        match self.position_of(&id) {
            Some(pos) => self.orders[pos] = order,
            None => self.orders.insert(0, order),
        }
        self.tentative.insert(id);
    }

    /// Discards a tentative entry whose server write failed, removing it from the list. Entries that have since been
    /// confirmed by an authoritative event are left alone.
    pub fn rollback_tentative(&mut self, order_id: &OrderId) {
        if self.tentative.remove(order_id) {
            if let Some(pos) = self.position_of(order_id) {
                self.orders.remove(pos);
            }
        }
    }

    pub fn is_tentative(&self, order_id: &OrderId) -> bool {
        self.tentative.contains(order_id)
    }

    fn position_of(&self, order_id: &OrderId) -> Option<usize> {
        self.orders.iter().position(|o| o.order_id == *order_id)
    }

    /// Replace in place if present (confirming any tentative entry), otherwise prepend.
    fn upsert(&mut self, order: &Order) {
        match self.position_of(&order.order_id) {
            Some(pos) => self.orders[pos] = order.clone(),
            None => self.orders.insert(0, order.clone()),
        }
        self.tentative.remove(&order.order_id);
    }
}
