//! End-to-end tests for placing orders and moving them through the status machine.
use campus_order_engine::{
    db_types::{NewOrder, NotificationType, OrderId, OrderItem, OrderStatus},
    NotificationManagement,
    OrderFlowError,
    OrderManagement,
};
use cfo_common::Cents;

mod support;
use support::{setup, tear_down};

fn burger_order(student_id: &str, vendor_id: &str) -> NewOrder {
    let items = vec![OrderItem::new("i1", "Burger", Cents::from(899), 2)];
    NewOrder::new(student_id, vendor_id, "shop-1", items)
        .with_delivery_location("Hostel A")
        .with_delivery_fee(Cents::from(500))
}

#[tokio::test]
async fn placing_an_order_notifies_the_vendor() {
    let api = setup().await;
    let order = api.place_order(burger_order("alice", "vendor-1")).await.expect("Error placing order");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, Cents::from(2 * 899 + 500));
    assert_eq!(order.delivery_location, "Hostel A");
    assert_eq!(order.items.0.len(), 1);

    let notifications = api.db().fetch_notifications("vendor-1", true).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].notification_type, NotificationType::NewOrder);
    assert_eq!(notifications[0].data.0.order_id, order.order_id);
    assert_eq!(notifications[0].data.0.total_amount, order.total_amount);
    tear_down(api).await;
}

#[tokio::test]
async fn placing_the_same_order_twice_is_rejected() {
    let api = setup().await;
    let order = burger_order("alice", "vendor-1");
    let _ = api.place_order(order.clone()).await.expect("Error placing order");
    let err = api.place_order(order).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderAlreadyExists(_)));
    tear_down(api).await;
}

#[tokio::test]
async fn vendor_transition_notifies_the_student() {
    let api = setup().await;
    let order = api.place_order(burger_order("alice", "vendor-1")).await.unwrap();
    let updated = api.transition(&order.order_id, OrderStatus::Preparing, "vendor-1").await.unwrap();
    assert_eq!(updated.status, OrderStatus::Preparing);

    let notifications = api.db().fetch_notifications("alice", true).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].notification_type, NotificationType::OrderUpdate);
    assert_eq!(notifications[0].data.0.status, OrderStatus::Preparing);
    tear_down(api).await;
}

#[tokio::test]
async fn the_full_happy_path_refreshes_the_delivery_estimate() {
    let api = setup().await;
    let order = api.place_order(burger_order("alice", "vendor-1")).await.unwrap();
    assert!(order.estimated_delivery_time.is_none());
    let oid = order.order_id.clone();
    for status in [OrderStatus::Preparing, OrderStatus::Prepared] {
        let updated = api.transition(&oid, status, "vendor-1").await.unwrap();
        assert!(updated.estimated_delivery_time.is_none());
    }
    let delivering = api.transition(&oid, OrderStatus::Delivering, "vendor-1").await.unwrap();
    assert_eq!(delivering.estimated_delivery_time.as_deref(), Some("20-30 minutes"));
    let delivered = api.transition(&oid, OrderStatus::Delivered, "vendor-1").await.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.estimated_delivery_time.as_deref(), Some("Delivered"));
    tear_down(api).await;
}

#[tokio::test]
async fn skipping_a_status_is_rejected() {
    let api = setup().await;
    let order = api.place_order(burger_order("alice", "vendor-1")).await.unwrap();
    let err = api.transition(&order.order_id, OrderStatus::Delivering, "vendor-1").await.unwrap_err();
    assert!(matches!(
        err,
        OrderFlowError::InvalidTransition { from: OrderStatus::Pending, to: OrderStatus::Delivering }
    ));
    // The order is untouched.
    let stored = api.db().fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    tear_down(api).await;
}

#[tokio::test]
async fn only_the_owning_vendor_may_transition() {
    let api = setup().await;
    let order = api.place_order(burger_order("alice", "vendor-1")).await.unwrap();
    let err = api.transition(&order.order_id, OrderStatus::Preparing, "vendor-2").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden(_)));
    tear_down(api).await;
}

#[tokio::test]
async fn transitioning_a_missing_order_is_not_found() {
    let api = setup().await;
    let err =
        api.transition(&OrderId::from("no-such-order".to_string()), OrderStatus::Preparing, "vendor-1").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderNotFound(_)));
    tear_down(api).await;
}

#[tokio::test]
async fn a_stale_expected_status_yields_conflict_and_no_duplicate_notification() {
    let api = setup().await;
    let order = api.place_order(burger_order("alice", "vendor-1")).await.unwrap();
    let oid = order.order_id.clone();
    // First caller wins.
    api.transition_from(&oid, OrderStatus::Pending, OrderStatus::Preparing, "vendor-1").await.unwrap();
    // Second caller observed `Pending` before the first write landed.
    let err = api.transition_from(&oid, OrderStatus::Pending, OrderStatus::Preparing, "vendor-1").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::StatusConflict(_)));
    // Exactly one update notification reached the student.
    let notifications = api.db().fetch_notifications("alice", true).await.unwrap();
    assert_eq!(notifications.len(), 1);
    tear_down(api).await;
}

#[tokio::test]
async fn two_racing_transitions_produce_one_winner() {
    let api = setup().await;
    let order = api.place_order(burger_order("alice", "vendor-1")).await.unwrap();
    let oid = order.order_id.clone();
    api.transition(&oid, OrderStatus::Preparing, "vendor-1").await.unwrap();
    api.transition(&oid, OrderStatus::Prepared, "vendor-1").await.unwrap();
    // Both sessions read `Prepared` and try to start the delivery.
    let (a, b) = tokio::join!(
        api.transition_from(&oid, OrderStatus::Prepared, OrderStatus::Delivering, "vendor-1"),
        api.transition_from(&oid, OrderStatus::Prepared, OrderStatus::Delivering, "vendor-1"),
    );
    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    let conflicts =
        [&a, &b].iter().filter(|r| matches!(r, Err(OrderFlowError::StatusConflict(_)))).count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 1);
    let stored = api.db().fetch_order_by_order_id(&oid).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Delivering);
    tear_down(api).await;
}

#[tokio::test]
async fn students_can_cancel_before_delivery() {
    let api = setup().await;
    let order = api.place_order(burger_order("alice", "vendor-1")).await.unwrap();
    let cancelled = api.cancel_order(&order.order_id, "alice").await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    // The vendor hears about it: one placement notification plus one cancellation update.
    let notifications = api.db().fetch_notifications("vendor-1", true).await.unwrap();
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0].notification_type, NotificationType::OrderUpdate);
    tear_down(api).await;
}

#[tokio::test]
async fn cancellation_is_rejected_once_delivery_started() {
    let api = setup().await;
    let order = api.place_order(burger_order("alice", "vendor-1")).await.unwrap();
    let oid = order.order_id.clone();
    for status in [OrderStatus::Preparing, OrderStatus::Prepared, OrderStatus::Delivering] {
        api.transition(&oid, status, "vendor-1").await.unwrap();
    }
    let err = api.cancel_order(&oid, "alice").await.unwrap_err();
    assert!(matches!(
        err,
        OrderFlowError::InvalidTransition { from: OrderStatus::Delivering, to: OrderStatus::Cancelled }
    ));
    tear_down(api).await;
}

#[tokio::test]
async fn only_the_owning_student_may_cancel() {
    let api = setup().await;
    let order = api.place_order(burger_order("alice", "vendor-1")).await.unwrap();
    let err = api.cancel_order(&order.order_id, "mallory").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden(_)));
    tear_down(api).await;
}

#[tokio::test]
async fn marking_a_notification_read_retires_it() {
    let api = setup().await;
    let _ = api.place_order(burger_order("alice", "vendor-1")).await.unwrap();
    let unread = api.db().fetch_notifications("vendor-1", true).await.unwrap();
    assert_eq!(unread.len(), 1);
    api.db().mark_notification_read(unread[0].id).await.unwrap();
    assert!(api.db().fetch_notifications("vendor-1", true).await.unwrap().is_empty());
    // Still visible when read notifications are included.
    assert_eq!(api.db().fetch_notifications("vendor-1", false).await.unwrap().len(), 1);
    tear_down(api).await;
}
