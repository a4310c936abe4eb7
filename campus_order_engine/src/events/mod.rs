//! Realtime propagation of order changes.
//!
//! Two mechanisms live here, and they serve different audiences:
//!
//! * The **hook system** ([`EventHooks`] / [`EventHandlers`]) lets server-side components react to order lifecycle
//!   events (order placed, status changed) with async handlers. It is stateless pub-sub: handlers receive the event
//!   and nothing else.
//! * The **change feed** ([`ChangeFeed`]) fans every order insert/update/delete out to live subscribers, each scoped
//!   by an [`SubscriptionScope`] filter. This is what keeps client order views fresh without polling.
mod channel;
mod event_types;
mod feed;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use feed::{ChangeFeed, OrderEventStream, SubscriptionId, DEFAULT_SUBSCRIBER_BUFFER};
pub use hooks::{EventHandlers, EventHooks, EventProducers};
