use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{types::Json, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatus},
    order_objects::OrderQueryFilter,
    traits::OrderFlowError,
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), OrderFlowError> {
    let inserted = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("📝️ Order {} inserted with id {}", order.order_id, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// The total amount is fixed here as the sum of the line totals plus the delivery fee; the order starts in
/// `Pending`.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderFlowError> {
    let total = order.total_amount();
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                student_id,
                vendor_id,
                shop_id,
                items,
                total_amount,
                status,
                delivery_location,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.student_id)
    .bind(order.vendor_id)
    .bind(order.shop_id)
    .bind(Json(order.items))
    .bind(total)
    .bind(OrderStatus::Pending)
    .bind(order.delivery_location)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

/// Returns the entry in the orders table for the corresponding `order_id`
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at`, newest first
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.as_str().to_string());
    }
    if let Some(student_id) = query.student_id {
        where_clause.push("student_id = ");
        where_clause.push_bind_unseparated(student_id);
    }
    if let Some(vendor_id) = query.vendor_id {
        where_clause.push("vendor_id = ");
        where_clause.push_bind_unseparated(vendor_id);
    }
    if let Some(shop_id) = query.shop_id {
        where_clause.push("shop_id = ");
        where_clause.push_bind_unseparated(shop_id);
    }
    if let Some(statuses) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let statuses = statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at DESC");

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

/// Conditionally moves the order to `new_status`: the row is only touched when its stored status still equals
/// `expected`. Returns `None` when no row matched, which the caller resolves into "not found" or "conflict".
///
/// `estimated_delivery_time`, when given, is overwritten in the same statement.
pub(crate) async fn update_order_status(
    order_id: &OrderId,
    expected: OrderStatus,
    new_status: OrderStatus,
    estimated_delivery_time: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let result: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                estimated_delivery_time = COALESCE($2, estimated_delivery_time),
                updated_at = $3
            WHERE order_id = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(new_status)
    .bind(estimated_delivery_time)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// The reaper's bulk conditional update: every order still in a pre-delivery status that was created before
/// `cutoff` is force-moved to `Delivered`. Affects zero rows when run again immediately.
pub(crate) async fn reap_stale_orders(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let rows = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Delivered', estimated_delivery_time = 'Delivered', updated_at = $1
            WHERE status IN ('Pending', 'Preparing', 'Prepared') AND unixepoch(created_at) < unixepoch($2)
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Unconditional administrative deletion, bypassing the status state machine.
pub(crate) async fn delete_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let deleted =
        sqlx::query_as("DELETE FROM orders WHERE order_id = $1 RETURNING *").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(deleted)
}
