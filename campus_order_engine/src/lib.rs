//! Campus Order Engine
//!
//! The order lifecycle core of the campus food-ordering service: students place orders against vendor shops, vendors
//! move them through a fixed delivery status machine, and every change fans out in realtime to the views that care.
//! This library contains that core and nothing around it. Authentication, menus, carts and the UI are external
//! collaborators that call in with already-verified identities.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@traits`] and [`mod@sqlite`]). The order and notification stores are defined as trait contracts;
//!    SQLite is the provided backend. You should never need to touch the database directly (use the public API),
//!    with the exception of the data types in [`mod@db_types`], which are public.
//! 2. The order flow API ([`OrderFlowApi`]): placing orders, vendor-authorized status transitions with optimistic
//!    concurrency, student cancellations, and the administrative stale-order sweep driven by [`mod@reaper`].
//! 3. Realtime propagation ([`mod@events`] and [`mod@views`]): every committed change is published once into a
//!    fan-out feed, and live view controllers keep materialized, de-duplicated order lists fresh from an initial
//!    fetch plus the event stream.
pub mod db_types;
pub mod events;
#[cfg(feature = "sqlite")]
pub mod reaper;
pub mod traits;
pub mod views;

mod order_api;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use order_api::{order_objects, OrderFlowApi};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{NotificationManagement, OrderFlowError, OrderManagement, OrderStoreDatabase};
