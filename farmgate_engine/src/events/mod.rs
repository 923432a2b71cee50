//! Engine events and the hooks that consume them.
//!
//! Events are published only after the change they describe has been committed. Publishing is fire-and-forget: a
//! failed or slow handler never affects the operation that produced the event.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
