//! Synchronous pub/sub bus.
//!
//! ## Delivery semantics
//!
//! - **Synchronous, in-order**: `emit` runs every handler for the topic on the
//!   caller's stack, in the order the handlers were registered.
//! - **At-most-once, no replay**: emissions are not stored; a handler added
//!   after an `emit` never sees it.
//! - **Handler isolation**: a panicking handler is caught and logged; the
//!   remaining handlers for that emission still run.
//!
//! Unsubscription is intentionally unsupported — handlers live for the page's
//! lifetime (see the session layer: its provider listener has its own
//! deregistration mechanism and does not go through the bus).

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;

/// A registered topic handler. Handlers must not assume they run on any
/// particular task: they run on whichever stack calls `emit`.
type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Process-wide publish/subscribe channel.
///
/// Shared as `Arc<EventBus>`; interior mutability keeps registration possible
/// from any component without threading `&mut` through the bootstrap graph.
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<String, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `topic`. Multiple handlers per topic are
    /// allowed; insertion order is preserved and honored by `emit`.
    pub fn on<F>(&self, topic: &str, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.entry(topic.to_string()).or_default().push(Arc::new(handler));
        }
    }

    /// Invoke all handlers registered for `topic` at the moment of the call,
    /// in registration order.
    ///
    /// Returns the number of handlers that ran (panicked ones included) —
    /// useful to callers that want to know whether anyone was listening.
    pub fn emit(&self, topic: &str, payload: impl Serialize) -> usize {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(topic, %err, "event payload failed to serialize");
                Value::Null
            }
        };
        // Snapshot under the lock, dispatch outside it, so a handler may
        // register further handlers (for a later emission) or emit on another
        // topic without deadlocking.
        let snapshot: Vec<Handler> = match self.handlers.lock() {
            Ok(handlers) => handlers.get(topic).map(|list| list.to_vec()).unwrap_or_default(),
            Err(_) => return 0,
        };

        for (index, handler) in snapshot.iter().enumerate() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(&payload))) {
                let message = panic_message(&panic);
                tracing::error!(topic, handler = index, %message, "event handler panicked");
            }
        }
        snapshot.len()
    }
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let count: usize = self
            .handlers
            .lock()
            .map(|h| h.values().map(Vec::len).sum())
            .unwrap_or(0);
        f.debug_struct("EventBus").field("handlers", &count).finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
