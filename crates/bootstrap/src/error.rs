//! Bootstrap error taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the orchestrator.
///
/// A `ComponentTimeout` is fatal to the *dependent* component only; the page
/// bootstrap decides whether to degrade or abort. `InitFailed` carries the
/// component's own error through `anyhow` since components are free to fail
/// with anything.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("component '{name}' is not registered")]
    UnknownComponent { name: String },

    #[error("timed out after {waited:?} waiting for component '{name}' to become ready")]
    ComponentTimeout { name: String, waited: Duration },

    #[error("component '{name}' failed to initialize: {error:#}")]
    InitFailed { name: String, error: anyhow::Error },
}

impl BootstrapError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BootstrapError::ComponentTimeout { .. })
    }
}
