//! Topic names and payload shapes exposed to the rest of the page.
//!
//! Payloads travel as `serde_json::Value`; the structs here are the canonical
//! shapes, serialized at the emit site and deserialized (leniently) by
//! interested handlers.

use serde::{Deserialize, Serialize};

use talentforge_core::Role;

/// A bootstrapped component flipped to ready.
pub const COMPONENT_READY: &str = "component:ready";

/// The whole fixed init order completed.
pub const APP_READY: &str = "app:ready";

/// Top-level init failed; payload carries the rendered error.
pub const APP_ERROR: &str = "app:error";

/// The access guard permitted the current page for a role.
pub const ROLE_CHANGED: &str = "roleChanged";

/// The session manager settled a subscription (sign-in, sign-out, timeout).
/// Internal: consumed by the client wiring to re-run the access guard.
pub const SESSION_CHANGED: &str = "session:changed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentReadyPayload {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppErrorPayload {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChangedPayload {
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionChangedPayload {
    /// Present after sign-in, absent after sign-out/timeout.
    pub identity_id: Option<String>,
}
