//! `talentforge-access` — role resolution and per-page access control.
//!
//! Pure policy: given the current session, profile, and location, exactly one
//! effective role comes out of a fixed precedence chain, and the page either
//! renders or redirects to the site root. No IO beyond the profile fetch, no
//! caching across navigations.

pub mod guard;
pub mod resolver;
pub mod routes;

pub use guard::{AccessDecision, AccessGuard};
pub use resolver::{RoleResolution, RoleSource, resolve_role};
pub use routes::RouteTable;
