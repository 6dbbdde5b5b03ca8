//! Role model for the multi-role job board.
//!
//! Unlike open-ended RBAC systems, the product has exactly four roles and the
//! route table is keyed by them, so the role is a closed enum rather than an
//! opaque string.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The four dashboard roles a signed-in (or demo) user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Job seeker. The fallback role when nothing else resolves.
    #[default]
    Candidate,
    /// Posts listings, reviews applicants.
    Employer,
    /// Manages talent on behalf of clients.
    Agency,
    /// Moderation and user management.
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Candidate, Role::Employer, Role::Agency, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Employer => "employer",
            Role::Agency => "agency",
            Role::Admin => "admin",
        }
    }

    /// Heuristic used when no profile or query override exists: match the
    /// email's local part against role names ("jane+employer@..." counts).
    ///
    /// Legacy behavior carried over for compatibility; candidate is never
    /// inferred this way, it is the fall-through default.
    pub fn infer_from_email(email: &str) -> Option<Role> {
        for role in [Role::Employer, Role::Agency, Role::Admin] {
            if email.contains(role.as_str()) {
                return Some(role);
            }
        }
        None
    }

    /// Heuristic for anonymous identities: infer the role from the dashboard
    /// path being visited (`/employer-dashboard` implies employer, etc).
    pub fn infer_from_path(path: &str) -> Option<Role> {
        for role in [Role::Employer, Role::Agency, Role::Admin] {
            if path.contains(&format!("{}-dashboard", role.as_str())) {
                return Some(role);
            }
        }
        if path.starts_with("/dashboard") {
            return Some(Role::Candidate);
        }
        None
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candidate" => Ok(Role::Candidate),
            "employer" => Ok(Role::Employer),
            "agency" => Ok(Role::Agency),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::UnknownRole(other.to_string())),
        }
    }
}
