//! Client-side materialized order views.
//!
//! [`OrderViewController`] is the pure reconciliation core: a de-duplicated, predicate-filtered list of order
//! snapshots that is driven by change events. [`LiveOrderView`] wires a controller to an initial store fetch and a
//! feed subscription, publishing fresh snapshots over a watch channel for as long as the view is alive.
mod controller;
mod live;

pub use controller::{LeftActiveHandler, OrderViewController, ViewPredicate};
pub use live::LiveOrderView;
