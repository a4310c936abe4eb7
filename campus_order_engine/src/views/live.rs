use log::*;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    db_types::Order,
    events::{ChangeFeed, SubscriptionScope},
    order_objects::OrderQueryFilter,
    traits::{OrderFlowError, OrderStoreDatabase},
    views::{LeftActiveHandler, OrderViewController, ViewPredicate},
};

/// A live, continuously reconciled view over the orders matching one scope.
///
/// Construction performs a fresh bulk fetch and registers a feed subscription, in that order of authority: the
/// fetch seeds the list, events reconcile it from there. Because every (re)subscription re-fetches, a view that was
/// torn down and recreated after a connection loss cannot silently miss updates.
///
/// Snapshots are published over a watch channel; dropping the view (or calling [`Self::unsubscribe`]) stops the
/// background task and releases the feed registration deterministically.
pub struct LiveOrderView {
    snapshot: watch::Receiver<Vec<Order>>,
    task: JoinHandle<()>,
}

impl LiveOrderView {
    pub(crate) async fn spawn<B: OrderStoreDatabase>(
        db: &B,
        feed: &ChangeFeed,
        scope: SubscriptionScope,
        active_only: bool,
        on_left_active: Option<LeftActiveHandler>,
    ) -> Result<Self, OrderFlowError> {
        // Subscribe before fetching so nothing committed between the two steps is missed. A row that shows up in
        // both the fetch and the stream is reconciled idempotently.
        let mut stream = feed.subscribe(scope.clone());
        let initial = db.search_orders(filter_for(&scope, active_only)).await?;
        let mut controller = OrderViewController::new(ViewPredicate::new(scope, active_only));
        if let Some(handler) = on_left_active {
            controller = controller.with_left_active_handler(handler);
        }
        controller.seed(initial);
        let (tx, rx) = watch::channel(controller.snapshot());
        let task = tokio::spawn(async move {
            while let Some(event) = stream.recv().await {
                controller.apply_event(&event);
                if tx.send(controller.snapshot()).is_err() {
                    break;
                }
            }
            trace!("🖥️ Live view task ended");
        });
        Ok(Self { snapshot: rx, task })
    }

    /// The current reconciled list.
    pub fn snapshot(&self) -> Vec<Order> {
        self.snapshot.borrow().clone()
    }

    /// Waits until the list changes. Returns an error once the view has been torn down.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.snapshot.changed().await
    }

    /// Tears the view down. Equivalent to dropping it; never panics, safe mid-delivery.
    pub fn unsubscribe(self) {}
}

impl Drop for LiveOrderView {
    fn drop(&mut self) {
        // Aborting the task drops the event stream, which removes the feed registration.
        self.task.abort();
    }
}

fn filter_for(scope: &SubscriptionScope, active_only: bool) -> OrderQueryFilter {
    let mut filter = match scope {
        SubscriptionScope::Order(id) => OrderQueryFilter::default().with_order_id(id.clone()),
        SubscriptionScope::Vendor { vendor_id, shop_id } => {
            let filter = OrderQueryFilter::default().with_vendor_id(vendor_id.clone());
            match shop_id {
                Some(shop) => filter.with_shop_id(shop.clone()),
                None => filter,
            }
        },
        SubscriptionScope::All => OrderQueryFilter::default(),
    };
    if active_only {
        filter = filter.active_only();
    }
    filter
}
