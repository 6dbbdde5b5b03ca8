//! `talentforge-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! roles, identities, the parsed browser location, and the durable key-value
//! storage contract consumed by the session layer.

pub mod error;
pub mod identity;
pub mod location;
pub mod role;
pub mod storage;

pub use error::DomainError;
pub use identity::{Identity, IdentityId, Profile};
pub use location::Location;
pub use role::Role;
pub use storage::{InMemoryStorage, KeyValueStorage};
