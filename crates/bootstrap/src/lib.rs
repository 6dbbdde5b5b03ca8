//! `talentforge-bootstrap` — dependency-ordered component initialization.
//!
//! Feature modules self-register with the [`Orchestrator`] in whatever order
//! their scripts happen to load; the orchestrator then drives each
//! component's `init()` strictly after its declared dependencies are ready,
//! with a bounded wait per dependency. Readiness is broadcast both through
//! watch channels (for waiters) and the event bus (for everyone else).

pub mod component;
pub mod error;
pub mod manifest;
pub mod orchestrator;

pub use component::Component;
pub use error::BootstrapError;
pub use manifest::{BootManifest, SESSION_MANAGER};
pub use orchestrator::Orchestrator;
