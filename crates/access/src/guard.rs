//! Access guard: authorize or redirect the current page.
//!
//! Runs once the session manager is ready and again on every identity change
//! or navigation. Deterministic and idempotent: the same session + location
//! always produce the same decision, and re-entrant invocations are harmless.

use std::sync::Arc;

use tracing::{debug, warn};

use talentforge_core::{Location, Profile};
use talentforge_events::{EventBus, RoleChangedPayload, topics};
use talentforge_session::SessionManager;

use crate::resolver::resolve_role;
use crate::routes::RouteTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The page may render for this role. `roleChanged` has been emitted.
    Render { role: talentforge_core::Role },
    /// The visitor is sent to the site root.
    Redirect { to: String },
}

pub struct AccessGuard {
    session: Arc<SessionManager>,
    routes: RouteTable,
    bus: Arc<EventBus>,
}

impl AccessGuard {
    pub fn new(session: Arc<SessionManager>, routes: RouteTable, bus: Arc<EventBus>) -> Self {
        Self {
            session,
            routes,
            bus,
        }
    }

    /// Decide the current page. Emits `roleChanged{role}` when it permits.
    pub async fn evaluate(&self, location: &Location) -> AccessDecision {
        let session = self.session.current_session();
        let profile = self.fetch_profile(&session).await;

        let resolved = resolve_role(profile.as_ref(), session.as_ref(), location);
        let path = location.path();

        let permitted = self.routes.is_public(path)
            || (session.is_some() && self.routes.role_allows(resolved.role, path))
            || (session.as_ref().is_some_and(|s| s.origin.is_demo_or_dev())
                && self.routes.is_dashboard_entry(path));

        if !permitted {
            debug!(path, role = %resolved.role, source = ?resolved.source, "access denied");
            if path == "/" {
                // Already at the root; redirecting again would loop.
                return AccessDecision::Render { role: resolved.role };
            }
            return AccessDecision::Redirect { to: "/".to_string() };
        }

        debug!(path, role = %resolved.role, source = ?resolved.source, "access granted");
        self.bus
            .emit(topics::ROLE_CHANGED, RoleChangedPayload { role: resolved.role });
        AccessDecision::Render { role: resolved.role }
    }

    /// Profile fetch is best-effort: failures degrade to the rest of the
    /// precedence chain instead of blocking the page.
    async fn fetch_profile(&self, session: &Option<talentforge_session::Session>) -> Option<Profile> {
        let session = session.as_ref()?;
        if session.identity.anonymous {
            return None;
        }
        let provider = self.session.provider()?;
        match provider.fetch_profile(&session.identity.id).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(%err, id = %session.identity.id, "profile fetch failed; using fallback role resolution");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use talentforge_core::{InMemoryStorage, KeyValueStorage, Role};
    use talentforge_session::{
        InMemoryIdentityProvider, SubscribeOptions,
    };

    use super::*;

    struct Rig {
        provider: InMemoryIdentityProvider,
        bus: Arc<EventBus>,
        session: Arc<SessionManager>,
        guard: AccessGuard,
    }

    async fn rig(location: Location) -> Rig {
        let provider = InMemoryIdentityProvider::new();
        let bus = Arc::new(EventBus::new());
        let session = Arc::new(SessionManager::new(
            Some(Arc::new(provider.clone())),
            Arc::new(InMemoryStorage::new()) as Arc<dyn KeyValueStorage>,
            Arc::clone(&bus),
            location,
        ));
        session.init().await.unwrap();
        let guard = AccessGuard::new(Arc::clone(&session), RouteTable::standard(), Arc::clone(&bus));
        Rig {
            provider,
            bus,
            session,
            guard,
        }
    }

    async fn settle(rig: &Rig) {
        rig.session
            .subscribe(SubscribeOptions {
                id: "guard-test".to_string(),
                timeout: Duration::from_secs(30),
                on_logged_in: Box::new(|_| {}),
                on_logged_out: Box::new(|| {}),
            })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unauthenticated_protected_path_redirects_to_root() {
        let location = Location::path_only("/dashboard");
        let rig = rig(location.clone()).await;

        let decision = rig.guard.evaluate(&location).await;
        assert_eq!(decision, AccessDecision::Redirect { to: "/".to_string() });
    }

    #[tokio::test(start_paused = true)]
    async fn public_paths_render_for_anyone() {
        let location = Location::path_only("/about");
        let rig = rig(location.clone()).await;

        let decision = rig.guard.evaluate(&location).await;
        assert!(matches!(decision, AccessDecision::Render { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn demo_session_opens_any_dashboard() {
        // ?demo=true&role=agency on /agency-dashboard: permitted without a
        // route-table membership check against the resolved role.
        let location = Location::parse("/agency-dashboard", "demo=true&role=agency");
        let rig = rig(location.clone()).await;
        settle(&rig).await;

        let decision = rig.guard.evaluate(&location).await;
        assert_eq!(decision, AccessDecision::Render { role: Role::Agency });

        // The relaxed check even opens a dashboard the role's own table
        // would deny.
        let elsewhere = Location::parse("/admin-dashboard", "demo=true&role=agency");
        rig.session.set_location(elsewhere.clone());
        let decision = rig.guard.evaluate(&elsewhere).await;
        assert_eq!(decision, AccessDecision::Render { role: Role::Agency });
    }

    #[tokio::test(start_paused = true)]
    async fn profile_role_drives_the_decision() {
        use talentforge_core::{Identity, IdentityId};

        let location = Location::path_only("/employer-dashboard");
        let rig = rig(location.clone()).await;

        let id = IdentityId::new("u1");
        rig.provider.seed_profile(
            &id,
            Profile {
                role: Some(Role::Employer),
                ..Profile::default()
            },
        );
        settle(&rig).await;
        rig.provider
            .set_identity(Some(Identity::real(id, "jane@example.com")));

        let decision = rig.guard.evaluate(&location).await;
        assert_eq!(decision, AccessDecision::Render { role: Role::Employer });

        // The same signed-in employer may not open the admin dashboard.
        let admin = Location::path_only("/admin-dashboard");
        let decision = rig.guard.evaluate(&admin).await;
        assert_eq!(decision, AccessDecision::Redirect { to: "/".to_string() });
    }

    #[tokio::test(start_paused = true)]
    async fn denied_visitor_already_at_root_is_not_redirected_again() {
        let location = Location::path_only("/");
        let rig = rig(location.clone()).await;

        let decision = rig.guard.evaluate(&location).await;
        assert!(matches!(decision, AccessDecision::Render { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn permit_emits_role_changed() {
        let location = Location::parse("/agency-dashboard", "demo=true&role=agency");
        let rig = rig(location.clone()).await;
        settle(&rig).await;

        let roles = Arc::new(Mutex::new(Vec::new()));
        {
            let roles = Arc::clone(&roles);
            rig.bus.on(topics::ROLE_CHANGED, move |payload| {
                roles.lock().unwrap().push(payload["role"].clone());
            });
        }

        rig.guard.evaluate(&location).await;
        assert_eq!(*roles.lock().unwrap(), vec![serde_json::json!("agency")]);
    }

    #[tokio::test(start_paused = true)]
    async fn evaluation_is_idempotent() {
        let location = Location::parse("/agency-dashboard", "demo=true&role=agency");
        let rig = rig(location.clone()).await;
        settle(&rig).await;

        let first = rig.guard.evaluate(&location).await;
        let second = rig.guard.evaluate(&location).await;
        assert_eq!(first, second);
    }
}
