//! `SqliteDatabase` is the concrete SQLite order store backend.
//!
//! It implements all the traits defined in the [`crate::traits`] module on top of a connection pool, delegating the
//! actual SQL to the functions in [`super::db`].
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::db::{db_url, new_pool, notifications, orders};
use crate::{
    db_types::{NewNotification, NewOrder, Notification, Order, OrderId, OrderStatus},
    order_objects::OrderQueryFilter,
    traits::{NotificationManagement, OrderFlowError, OrderManagement, OrderStoreDatabase},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database given by the `CFO_DATABASE_URL` environment variable, or the default path.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(filter, &mut conn).await?;
        Ok(orders)
    }
}

impl NotificationManagement for SqliteDatabase {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let stored = notifications::insert_notification(notification, &mut tx).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn fetch_notifications(
        &self,
        recipient_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let notifications = notifications::fetch_notifications(recipient_id, unread_only, &mut conn).await?;
        Ok(notifications)
    }

    async fn mark_notification_read(&self, id: i64) -> Result<(), OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        notifications::mark_notification_read(id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

impl OrderStoreDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let inserted = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatus,
        new_status: OrderStatus,
        estimated_delivery_time: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let updated =
            orders::update_order_status(order_id, expected, new_status, estimated_delivery_time, &mut tx).await?;
        let result = match updated {
            Some(order) => Ok(order),
            // No row matched: either the order is gone, or someone else moved it first.
            None => match orders::fetch_order_by_order_id(order_id, &mut tx).await? {
                Some(_) => Err(OrderFlowError::StatusConflict(order_id.clone())),
                None => Err(OrderFlowError::OrderNotFound(order_id.clone())),
            },
        };
        tx.commit().await?;
        result
    }

    async fn reap_stale_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let reaped = orders::reap_stale_orders(cutoff, &mut tx).await?;
        tx.commit().await?;
        Ok(reaped)
    }

    async fn delete_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let deleted = orders::delete_order(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn close(&mut self) -> Result<(), OrderFlowError> {
        self.pool.close().await;
        Ok(())
    }
}
