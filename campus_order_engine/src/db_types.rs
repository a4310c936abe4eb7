use std::{fmt::Display, str::FromStr};

use cfo_common::Cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

/// The flat delivery fee added to every order total at creation time.
pub const DEFAULT_DELIVERY_FEE: Cents = Cents::from_whole(5);

//--------------------------------------      OrderId      -----------------------------------------------------------
/// A lightweight wrapper around the opaque order identifier assigned at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates a fresh random order id.
    pub fn random() -> Self {
        Self(format!("ord-{:016x}", rand::random::<u64>()))
    }
}

//--------------------------------------    OrderStatus    -----------------------------------------------------------
/// The canonical order status set. An order only ever moves along
/// `Pending → Preparing → Prepared → Delivering → Delivered`, with `Cancelled` reachable from any state before
/// `Delivering`. `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// The order has been placed and the vendor has not started on it yet.
    Pending,
    /// The vendor is preparing the order.
    Preparing,
    /// Preparation is complete and the order is waiting for a courier.
    Prepared,
    /// The order is on its way to the delivery location.
    Delivering,
    /// The order has been handed over. Terminal.
    Delivered,
    /// The order was cancelled before it went out for delivery. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// The single canonical successor along the happy path. Terminal states return themselves, so UIs offering a
    /// "mark as next" action can call this unconditionally.
    pub fn next(&self) -> Self {
        match self {
            Self::Pending => Self::Preparing,
            Self::Preparing => Self::Prepared,
            Self::Prepared => Self::Delivering,
            Self::Delivering => Self::Delivered,
            Self::Delivered => Self::Delivered,
            Self::Cancelled => Self::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// An order is active while a vendor still has work to do on it.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether `new` is a valid direct successor of `self` in the status state machine.
    pub fn can_transition_to(&self, new: Self) -> bool {
        if new == Self::Cancelled {
            return matches!(self, Self::Pending | Self::Preparing | Self::Prepared);
        }
        !self.is_terminal() && self.next() == new
    }

    /// The statuses an active-orders view cares about.
    pub fn active_statuses() -> [Self; 4] {
        [Self::Pending, Self::Preparing, Self::Prepared, Self::Delivering]
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Preparing => write!(f, "Preparing"),
            Self::Prepared => write!(f, "Prepared"),
            Self::Delivering => write!(f, "Delivering"),
            Self::Delivered => write!(f, "Delivered"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Preparing" => Ok(Self::Preparing),
            "Prepared" => Ok(Self::Prepared),
            "Delivering" => Ok(Self::Delivering),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------     OrderItem     -----------------------------------------------------------
/// One line of an order. Items are fixed at creation; there are no partial edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub menu_item_id: String,
    pub name: String,
    pub unit_price: Cents,
    pub quantity: i64,
}

impl OrderItem {
    pub fn new<S1: Into<String>, S2: Into<String>>(menu_item_id: S1, name: S2, unit_price: Cents, quantity: i64) -> Self {
        Self { menu_item_id: menu_item_id.into(), name: name.into(), unit_price, quantity }
    }

    pub fn line_total(&self) -> Cents {
        self.unit_price * self.quantity
    }
}

//--------------------------------------       Order       -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub student_id: String,
    pub vendor_id: String,
    pub shop_id: String,
    pub items: Json<Vec<OrderItem>>,
    pub total_amount: Cents,
    pub status: OrderStatus,
    pub delivery_location: String,
    pub estimated_delivery_time: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewOrder     -----------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// The order id assigned at creation. Use [`OrderId::random`] unless replaying a known order.
    pub order_id: OrderId,
    pub student_id: String,
    pub vendor_id: String,
    pub shop_id: String,
    pub items: Vec<OrderItem>,
    pub delivery_location: String,
    /// The flat delivery fee folded into the total at creation.
    pub delivery_fee: Cents,
    /// The time the order was placed. Defaults to now.
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new<S1, S2, S3>(student_id: S1, vendor_id: S2, shop_id: S3, items: Vec<OrderItem>) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            order_id: OrderId::random(),
            student_id: student_id.into(),
            vendor_id: vendor_id.into(),
            shop_id: shop_id.into(),
            items,
            delivery_location: String::default(),
            delivery_fee: DEFAULT_DELIVERY_FEE,
            created_at: Utc::now(),
        }
    }

    pub fn with_delivery_location<S: Into<String>>(mut self, location: S) -> Self {
        self.delivery_location = location.into();
        self
    }

    pub fn with_delivery_fee(mut self, fee: Cents) -> Self {
        self.delivery_fee = fee;
        self
    }

    pub fn placed_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// The total fixed at creation: sum of line totals plus the delivery fee.
    pub fn total_amount(&self) -> Cents {
        self.items.iter().map(OrderItem::line_total).sum::<Cents>() + self.delivery_fee
    }
}

//--------------------------------------  NotificationType -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum NotificationType {
    /// A new order was placed. Addressed to the vendor.
    NewOrder,
    /// An order's status changed. Addressed to the counterpart of whoever triggered the change.
    OrderUpdate,
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewOrder => write!(f, "NewOrder"),
            Self::OrderUpdate => write!(f, "OrderUpdate"),
        }
    }
}

impl FromStr for NotificationType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NewOrder" => Ok(Self::NewOrder),
            "OrderUpdate" => Ok(Self::OrderUpdate),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------  NotificationData -----------------------------------------------------------
/// The structured payload attached to a notification: enough for a client to render the alert without a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total_amount: Cents,
}

impl NotificationData {
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            status: order.status,
            items: order.items.0.clone(),
            total_amount: order.total_amount,
        }
    }
}

//--------------------------------------    Notification   -----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: String,
    pub notification_type: NotificationType,
    pub message: String,
    pub data: Json<NotificationData>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: String,
    pub notification_type: NotificationType,
    pub message: String,
    pub data: NotificationData,
}

impl NewNotification {
    pub fn new_order(vendor_id: &str, order: &Order) -> Self {
        Self {
            recipient_id: vendor_id.to_string(),
            notification_type: NotificationType::NewOrder,
            message: format!("New order {} for {}", order.order_id, order.total_amount),
            data: NotificationData::for_order(order),
        }
    }

    pub fn order_update(recipient_id: &str, order: &Order) -> Self {
        Self {
            recipient_id: recipient_id.to_string(),
            notification_type: NotificationType::OrderUpdate,
            message: format!("Order {} is now {}", order.order_id, order.status),
            data: NotificationData::for_order(order),
        }
    }
}
