//! Component contract.

use async_trait::async_trait;

/// A self-registering feature module.
///
/// `init()` runs at most once per page; the orchestrator guarantees it is
/// only invoked after every declared dependency reported ready. Components
/// that need no setup can rely on the default no-op.
#[async_trait]
pub trait Component: Send + Sync {
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Lifecycle of a registered component.
///
/// `Ready` is terminal: it flips exactly once and is never reset short of a
/// full page reload. A failed `init()` drops the component back to
/// `Registered` so the page bootstrap may retry explicitly; the orchestrator
/// itself never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Registered,
    Initializing,
    Ready,
}
