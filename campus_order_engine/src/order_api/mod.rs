//! The public order flow API: placing orders, authorized status transitions, cancellations and the stale-order
//! sweep. This is the sole code path that mutates order status.
mod order_flow_api;
pub mod order_objects;

pub use order_flow_api::OrderFlowApi;
