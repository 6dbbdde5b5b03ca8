//! `talentforge-session` — the single authoritative identity.
//!
//! Three asynchronous signal sources race for "who is the user": the identity
//! provider's state-change callback, a demo/dev query-string flow, and a
//! cached demo session record. The [`SessionManager`] arbitrates them behind
//! a settle-once subscription slot so exactly one terminal callback fires per
//! subscription, no matter which signal lands first.

pub mod demo;
pub mod manager;
pub mod provider;

pub use demo::{DEMO_SESSION_KEY, DemoSessionRecord};
pub use manager::{
    LoggedInCallback, LoggedOutCallback, Session, SessionError, SessionManager, SessionOrigin,
    SubscribeOptions, SubscriptionHandle,
};
pub use provider::{
    IdentityListener, IdentityProvider, InMemoryIdentityProvider, ListenerGuard, ProviderError,
};
