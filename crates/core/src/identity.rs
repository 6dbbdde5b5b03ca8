//! Identity and profile primitives.
//!
//! Identity ids are issued by the external identity provider and are opaque
//! strings at this layer (the in-memory provider mints UUIDv7 values, a real
//! provider uses whatever it likes).

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Role;

/// Opaque provider-issued identifier for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    /// Mint a fresh id (used by the in-memory provider for anonymous sign-in).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IdentityId {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for IdentityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A user handle as reported by the identity provider.
///
/// Anonymous identities come from demo sign-in; they carry no credentials and
/// usually no email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub email: Option<String>,
    pub anonymous: bool,
}

impl Identity {
    pub fn real(id: IdentityId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: Some(email.into()),
            anonymous: false,
        }
    }

    pub fn anonymous(id: IdentityId) -> Self {
        Self {
            id,
            email: None,
            anonymous: true,
        }
    }
}

/// Profile document persisted by the provider's document store, keyed by
/// identity id. Only the fields the access core reads are modeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Profile {
    pub role: Option<Role>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
