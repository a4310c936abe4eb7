//! # Storage backend contracts.
//!
//! This module defines the interface contracts that order store *backends* have to fulfil in order to power the
//! campus order engine. The engine itself never talks to a database directly; everything goes through these traits,
//! so a backend can be swapped without touching the order flow logic.
//!
//! ## Traits
//! * [`OrderStoreDatabase`] defines the highest level of behaviour: order inserts, conditional status updates, the
//!   stale-order sweep and unconditional administrative deletion.
//! * [`OrderManagement`] provides read-side queries over orders.
//! * [`NotificationManagement`] covers the per-recipient notification records written as transition side effects.
mod notification_management;
mod order_management;
mod order_store_database;

pub use notification_management::NotificationManagement;
pub use order_management::OrderManagement;
pub use order_store_database::{OrderFlowError, OrderStoreDatabase};
