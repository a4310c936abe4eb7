use chrono::Utc;
use log::trace;
use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{NewNotification, Notification};

/// Stores a new notification record, returning the stored row.
pub(crate) async fn insert_notification(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<Notification, sqlx::Error> {
    let stored = sqlx::query_as(
        r#"
            INSERT INTO notifications (recipient_id, notification_type, message, data, is_read, created_at)
            VALUES ($1, $2, $3, $4, 0, $5)
            RETURNING *;
        "#,
    )
    .bind(notification.recipient_id)
    .bind(notification.notification_type)
    .bind(notification.message)
    .bind(Json(notification.data))
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(stored)
}

/// Fetches notifications for a recipient, newest first, optionally restricted to unread ones.
pub(crate) async fn fetch_notifications(
    recipient_id: &str,
    unread_only: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, sqlx::Error> {
    let sql = if unread_only {
        "SELECT * FROM notifications WHERE recipient_id = $1 AND is_read = 0 ORDER BY created_at DESC"
    } else {
        "SELECT * FROM notifications WHERE recipient_id = $1 ORDER BY created_at DESC"
    };
    let notifications = sqlx::query_as(sql).bind(recipient_id).fetch_all(conn).await?;
    trace!("📨️ Fetched {} notification(s) for {recipient_id}", notifications.len());
    Ok(notifications)
}

/// Marks a notification as read. A no-op if it is already read, or does not exist.
pub(crate) async fn mark_notification_read(id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = $1").bind(id).execute(conn).await?;
    Ok(())
}
