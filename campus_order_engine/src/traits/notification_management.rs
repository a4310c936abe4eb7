use crate::{
    db_types::{NewNotification, Notification},
    traits::OrderFlowError,
};

/// Per-recipient notification records. These are written by the transition service as a side effect of status
/// changes and read back by vendor and student clients.
#[allow(async_fn_in_trait)]
pub trait NotificationManagement {
    /// Stores a new notification, returning the stored record.
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, OrderFlowError>;

    /// Fetches notifications for the given recipient, newest first. When `unread_only` is set, notifications that
    /// have already been marked as read are skipped.
    async fn fetch_notifications(
        &self,
        recipient_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, OrderFlowError>;

    /// Marks the notification with the given id as read. Marking an already-read notification is a no-op.
    async fn mark_notification_read(&self, id: i64) -> Result<(), OrderFlowError>;
}
