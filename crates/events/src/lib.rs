//! `talentforge-events` — the process-wide event bus.
//!
//! A deliberately small pub/sub channel: handlers are registered per topic
//! and invoked synchronously, in registration order, on the emitter's stack.
//! No persistence and no replay — a handler registered after an `emit` never
//! sees that emission.

pub mod bus;
pub mod topics;

pub use bus::EventBus;
pub use topics::{AppErrorPayload, ComponentReadyPayload, RoleChangedPayload, SessionChangedPayload};
