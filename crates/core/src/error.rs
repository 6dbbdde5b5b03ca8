//! Domain error model.

use thiserror::Error;

/// Domain-level error.
///
/// Keep this focused on deterministic domain failures. Infrastructure
/// concerns belong to the owning crate (session/bootstrap errors live there).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An unknown role name was supplied.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}
