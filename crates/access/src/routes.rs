//! Static role → route table.
//!
//! Loaded once at process start, immutable afterwards. Paths match by
//! segment prefix: `/jobs` covers `/jobs` and `/jobs/123`, never `/jobsboard`.

use std::collections::HashMap;

use talentforge_core::Role;

/// Dashboard entry points, one per role. Demo/dev sessions may open any of
/// these regardless of table membership (the relaxed reviewer check).
const DASHBOARDS: [&str; 4] = [
    "/dashboard",
    "/employer-dashboard",
    "/agency-dashboard",
    "/admin-dashboard",
];

/// Paths every visitor may open, signed in or not.
const PUBLIC: [&str; 4] = ["/", "/login", "/signup", "/about"];

#[derive(Debug, Clone)]
pub struct RouteTable {
    allowed: HashMap<Role, Vec<&'static str>>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RouteTable {
    /// The production table.
    pub fn standard() -> Self {
        let mut allowed = HashMap::new();
        allowed.insert(
            Role::Candidate,
            vec!["/dashboard", "/profile", "/jobs", "/applications", "/chat"],
        );
        allowed.insert(
            Role::Employer,
            vec!["/employer-dashboard", "/listings", "/applicants", "/chat"],
        );
        allowed.insert(
            Role::Agency,
            vec!["/agency-dashboard", "/talent", "/clients", "/chat"],
        );
        allowed.insert(
            Role::Admin,
            vec!["/admin-dashboard", "/moderation", "/users"],
        );
        Self { allowed }
    }

    pub fn role_allows(&self, role: Role, path: &str) -> bool {
        self.allowed
            .get(&role)
            .is_some_and(|prefixes| prefixes.iter().any(|prefix| prefix_matches(prefix, path)))
    }

    pub fn is_public(&self, path: &str) -> bool {
        PUBLIC.iter().any(|prefix| prefix_matches(prefix, path))
    }

    pub fn is_dashboard_entry(&self, path: &str) -> bool {
        DASHBOARDS.iter().any(|prefix| prefix_matches(prefix, path))
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}
