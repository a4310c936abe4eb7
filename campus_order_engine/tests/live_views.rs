//! Tests for the live view surface: scoped subscriptions that stay reconciled as orders move through the
//! lifecycle.
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use campus_order_engine::{
    db_types::{NewOrder, Order, OrderItem, OrderStatus},
    views::LiveOrderView,
    OrderManagement,
};
use cfo_common::Cents;
use chrono::Utc;

mod support;
use support::{setup, tear_down};

fn noodle_order(student_id: &str, vendor_id: &str, shop_id: &str) -> NewOrder {
    let items = vec![OrderItem::new("i7", "Noodles", Cents::from(1200), 1)];
    NewOrder::new(student_id, vendor_id, shop_id, items).with_delivery_location("Library steps")
}

/// Polls the view until `predicate` holds for a snapshot, waiting for changes in between. Panics after 5 seconds.
async fn wait_for<P>(view: &mut LiveOrderView, predicate: P) -> Vec<Order>
where P: Fn(&[Order]) -> bool {
    loop {
        let snapshot = view.snapshot();
        if predicate(&snapshot) {
            return snapshot;
        }
        tokio::time::timeout(Duration::from_secs(5), view.changed())
            .await
            .expect("Timed out waiting for the view to change")
            .expect("View was torn down while waiting");
    }
}

#[tokio::test]
async fn an_order_view_follows_the_order_through_the_lifecycle() {
    let api = setup().await;
    let order = api.place_order(noodle_order("alice", "vendor-1", "shop-1")).await.unwrap();
    let mut view = api.subscribe_order(&order.order_id).await.unwrap();
    // The initial fetch already contains the order.
    let snapshot = view.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].status, OrderStatus::Pending);

    api.transition(&order.order_id, OrderStatus::Preparing, "vendor-1").await.unwrap();
    let snapshot = wait_for(&mut view, |orders| orders[0].status == OrderStatus::Preparing).await;
    assert_eq!(snapshot.len(), 1);
    tear_down(api).await;
}

#[tokio::test]
async fn a_vendor_view_tracks_the_active_set() {
    let api = setup().await;
    let mut view = api.subscribe_vendor_active_orders("vendor-1", None, None).await.unwrap();
    assert!(view.snapshot().is_empty());

    let first = api.place_order(noodle_order("alice", "vendor-1", "shop-1")).await.unwrap();
    let second = api.place_order(noodle_order("bob", "vendor-1", "shop-2")).await.unwrap();
    // An order for another vendor never shows up.
    let _ = api.place_order(noodle_order("carol", "vendor-2", "shop-9")).await.unwrap();
    wait_for(&mut view, |orders| orders.len() == 2).await;

    // Walking the first order out of the active set shrinks the view.
    let oid = first.order_id.clone();
    for status in [OrderStatus::Preparing, OrderStatus::Prepared, OrderStatus::Delivering, OrderStatus::Delivered] {
        api.transition(&oid, status, "vendor-1").await.unwrap();
    }
    let snapshot = wait_for(&mut view, |orders| orders.len() == 1).await;
    assert_eq!(snapshot[0].order_id, second.order_id);
    tear_down(api).await;
}

#[tokio::test]
async fn the_left_active_callback_fires_once_per_departing_order() {
    let api = setup().await;
    let departures = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&departures);
    let handler: campus_order_engine::views::LeftActiveHandler =
        Arc::new(move |_order: &Order| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    let mut view = api.subscribe_vendor_active_orders("vendor-1", None, Some(handler)).await.unwrap();

    let order = api.place_order(noodle_order("alice", "vendor-1", "shop-1")).await.unwrap();
    wait_for(&mut view, |orders| orders.len() == 1).await;
    api.cancel_order(&order.order_id, "alice").await.unwrap();
    wait_for(&mut view, |orders| orders.is_empty()).await;
    assert_eq!(departures.load(Ordering::SeqCst), 1);
    tear_down(api).await;
}

#[tokio::test]
async fn a_shop_scoped_view_ignores_the_vendors_other_shops() {
    let api = setup().await;
    let mut view = api.subscribe_vendor_active_orders("vendor-1", Some("shop-1"), None).await.unwrap();
    let in_scope = api.place_order(noodle_order("alice", "vendor-1", "shop-1")).await.unwrap();
    let _ = api.place_order(noodle_order("bob", "vendor-1", "shop-2")).await.unwrap();
    let snapshot = wait_for(&mut view, |orders| orders.len() == 1).await;
    assert_eq!(snapshot[0].order_id, in_scope.order_id);
    tear_down(api).await;
}

#[tokio::test]
async fn subscribing_after_the_fact_still_sees_existing_orders() {
    let api = setup().await;
    let older = api.place_order(noodle_order("alice", "vendor-1", "shop-1")).await.unwrap();
    // The view is created well after placement; the construction-time fetch covers the gap.
    let view = api.subscribe_order(&older.order_id).await.unwrap();
    let snapshot = view.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].order_id, older.order_id);
    tear_down(api).await;
}

#[tokio::test]
async fn the_public_feed_sees_everything() {
    let api = setup().await;
    let mut view = api.subscribe_public_feed().await.unwrap();
    let _ = api.place_order(noodle_order("alice", "vendor-1", "shop-1")).await.unwrap();
    let _ = api.place_order(noodle_order("bob", "vendor-2", "shop-9")).await.unwrap();
    let snapshot = wait_for(&mut view, |orders| orders.len() == 2).await;
    assert_eq!(snapshot.len(), 2);
    tear_down(api).await;
}

#[tokio::test]
async fn dropping_a_view_releases_its_feed_registration() {
    let api = setup().await;
    let order = api.place_order(noodle_order("alice", "vendor-1", "shop-1")).await.unwrap();
    let view = api.subscribe_order(&order.order_id).await.unwrap();
    assert_eq!(api.feed().subscriber_count(), 1);
    view.unsubscribe();
    // The background task drops asynchronously after the abort.
    for _ in 0..50 {
        if api.feed().subscriber_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(api.feed().subscriber_count(), 0);
    tear_down(api).await;
}

#[tokio::test]
async fn an_administrative_deletion_reaches_its_subscribers() {
    let api = setup().await;
    let order = api.place_order(noodle_order("alice", "vendor-1", "shop-1")).await.unwrap();
    let mut view = api.subscribe_vendor_active_orders("vendor-1", None, None).await.unwrap();
    wait_for(&mut view, |orders| orders.len() == 1).await;

    let deleted = api.delete_order(&order.order_id).await.unwrap();
    assert_eq!(deleted.unwrap().order_id, order.order_id);
    wait_for(&mut view, |orders| orders.is_empty()).await;
    // The row is gone; a second deletion is a no-op.
    assert!(api.db().fetch_order_by_order_id(&order.order_id).await.unwrap().is_none());
    assert!(api.delete_order(&order.order_id).await.unwrap().is_none());
    tear_down(api).await;
}

#[tokio::test]
async fn a_reaped_order_reaches_its_subscribers() {
    let api = setup().await;
    let stale = noodle_order("alice", "vendor-1", "shop-1").placed_at(Utc::now() - chrono::Duration::hours(3));
    let order = api.place_order(stale).await.unwrap();
    let mut vendor_view = api.subscribe_vendor_active_orders("vendor-1", None, None).await.unwrap();
    let mut order_view = api.subscribe_order(&order.order_id).await.unwrap();
    wait_for(&mut vendor_view, |orders| orders.len() == 1).await;

    let reaped = api.reap_stale_orders(chrono::Duration::hours(2)).await.unwrap();
    assert_eq!(reaped.len(), 1);
    // The vendor's active view empties, and the student's tracking view shows the forced terminal state.
    wait_for(&mut vendor_view, |orders| orders.is_empty()).await;
    let snapshot = wait_for(&mut order_view, |orders| orders[0].status == OrderStatus::Delivered).await;
    assert_eq!(snapshot.len(), 1);
    tear_down(api).await;
}
