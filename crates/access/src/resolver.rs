//! Effective role resolution.
//!
//! Derived on every guard invocation, never cached across navigations.
//! Each rule either matches or falls through, so exactly one role comes out.

use serde::Serialize;

use talentforge_core::{Location, Profile, Role};
use talentforge_session::Session;

/// Which precedence rule produced the role (kept for logs and debugging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    Profile,
    QueryOverride,
    EmailHeuristic,
    PathHeuristic,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleResolution {
    pub role: Role,
    pub source: RoleSource,
}

/// Resolve the effective role. Precedence, highest first:
///
/// 1. role recorded in the persisted profile
/// 2. role named in the query string (demo/dev override links)
/// 3. substring match of the identity's email against role names
/// 4. for an anonymous identity, the dashboard name in the current path
/// 5. the default role (candidate)
///
/// The email heuristic is legacy behavior reproduced for compatibility; see
/// DESIGN.md.
pub fn resolve_role(
    profile: Option<&Profile>,
    session: Option<&Session>,
    location: &Location,
) -> RoleResolution {
    if let Some(role) = profile.and_then(|p| p.role) {
        return RoleResolution {
            role,
            source: RoleSource::Profile,
        };
    }

    if let Some(role) = location.query_role() {
        return RoleResolution {
            role,
            source: RoleSource::QueryOverride,
        };
    }

    if let Some(session) = session {
        if let Some(role) = session
            .identity
            .email
            .as_deref()
            .and_then(Role::infer_from_email)
        {
            return RoleResolution {
                role,
                source: RoleSource::EmailHeuristic,
            };
        }

        if session.identity.anonymous {
            if let Some(role) = Role::infer_from_path(location.path()) {
                return RoleResolution {
                    role,
                    source: RoleSource::PathHeuristic,
                };
            }
        }
    }

    RoleResolution {
        role: Role::default(),
        source: RoleSource::Default,
    }
}
