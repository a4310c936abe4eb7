use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatus},
    traits::{NotificationManagement, OrderManagement},
};

/// This trait defines the highest level of behaviour for backends supporting the campus order engine.
///
/// This behaviour includes:
/// * Storing newly placed orders.
/// * Conditionally updating order status (optimistic concurrency).
/// * The bulk stale-order sweep used by the reaper.
/// * Unconditional administrative deletion.
#[allow(async_fn_in_trait)]
pub trait OrderStoreDatabase: Clone + OrderManagement + NotificationManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Takes a new order and stores it in `Pending` status. This call is idempotent: if the order id already exists,
    /// the stored order is returned and the second element of the tuple is `false`.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderFlowError>;

    /// Updates the status of the given order, but only if its current status still equals `expected`.
    ///
    /// If the order's status has been changed by another actor since the caller last read it, no row is touched and
    /// [`OrderFlowError::StatusConflict`] is returned. The caller must re-fetch before deciding whether to retry.
    ///
    /// `estimated_delivery_time`, when given, overwrites the stored estimate in the same write.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatus,
        new_status: OrderStatus,
        estimated_delivery_time: Option<String>,
    ) -> Result<Order, OrderFlowError>;

    /// Force-moves every order that is still in a non-terminal pre-delivery status (`Pending`, `Preparing`,
    /// `Prepared`) and was created before `cutoff` into `Delivered`.
    ///
    /// This deliberately bypasses the status edge validation; it is only reachable through the reaper entry point.
    /// Running it twice in a row is harmless: the second sweep matches zero rows.
    ///
    /// Returns the orders that were moved.
    async fn reap_stale_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError>;

    /// Unconditionally removes an order, bypassing the status state machine. Administrative cleanup only.
    /// Returns the deleted row, if there was one.
    async fn delete_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderFlowError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("The order store is unreachable or misconfigured: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("Not allowed: {0}")]
    Forbidden(String),
    #[error("An order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("The status of order {0} changed concurrently. Re-fetch before retrying.")]
    StatusConflict(OrderId),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}
