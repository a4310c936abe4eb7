use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, OrderStatus};

//--------------------------------------     ChangeKind    -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

//--------------------------------------  OrderChangeEvent -----------------------------------------------------------
/// One change to the orders table, as delivered to feed subscribers.
///
/// Insert and update events carry the full new row. Delete events carry the last-known row, which is enough for a
/// subscriber to identify and drop the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderChangeEvent {
    pub kind: ChangeKind,
    pub order: Order,
}

impl OrderChangeEvent {
    pub fn inserted(order: Order) -> Self {
        Self { kind: ChangeKind::Insert, order }
    }

    pub fn updated(order: Order) -> Self {
        Self { kind: ChangeKind::Update, order }
    }

    pub fn deleted(last_known: Order) -> Self {
        Self { kind: ChangeKind::Delete, order: last_known }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order.order_id
    }
}

//-------------------------------------- SubscriptionScope -----------------------------------------------------------
/// The predicate attached to a feed subscription. Events whose row does not match the scope are never delivered to
/// that subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionScope {
    /// A single order, e.g. the student's tracking view.
    Order(OrderId),
    /// All orders for one vendor, optionally narrowed to one shop.
    Vendor { vendor_id: String, shop_id: Option<String> },
    /// Unscoped. The public community feed.
    All,
}

impl SubscriptionScope {
    pub fn order(order_id: OrderId) -> Self {
        Self::Order(order_id)
    }

    pub fn vendor<S: Into<String>>(vendor_id: S) -> Self {
        Self::Vendor { vendor_id: vendor_id.into(), shop_id: None }
    }

    pub fn vendor_shop<S1: Into<String>, S2: Into<String>>(vendor_id: S1, shop_id: S2) -> Self {
        Self::Vendor { vendor_id: vendor_id.into(), shop_id: Some(shop_id.into()) }
    }

    pub fn matches(&self, order: &Order) -> bool {
        match self {
            Self::Order(id) => order.order_id == *id,
            Self::Vendor { vendor_id, shop_id } => {
                order.vendor_id == *vendor_id && shop_id.as_ref().map(|s| order.shop_id == *s).unwrap_or(true)
            },
            Self::All => true,
        }
    }
}

//--------------------------------------    Hook events    -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlacedEvent {
    pub order: Order,
}

impl OrderPlacedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub previous: OrderStatus,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, previous: OrderStatus) -> Self {
        Self { order, previous }
    }
}
