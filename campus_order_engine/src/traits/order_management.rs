use crate::{
    db_types::{Order, OrderId},
    order_objects::OrderQueryFilter,
    traits::OrderFlowError,
};

/// Read-side queries over the orders table. Every backend exposes these; the live views and the transition service
/// are both built on top of them.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Fetches the order with the given order id, or `None` if it does not exist.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    /// Fetches orders according to the criteria in the [`OrderQueryFilter`].
    ///
    /// Results are ordered by `created_at`, newest first, so view controllers can seed their lists directly.
    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError>;
}
