//! The one place everything is wired together.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info};

use talentforge_access::{AccessDecision, AccessGuard, RouteTable};
use talentforge_bootstrap::{Component, Orchestrator, SESSION_MANAGER};
use talentforge_core::{Identity, KeyValueStorage, Location, Role};
use talentforge_events::{EventBus, topics};
use talentforge_session::{
    IdentityProvider, SessionManager, SubscribeOptions, SubscriptionHandle,
};

/// How long the page waits for a provider callback before treating the
/// visitor as logged out.
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub location: Location,
    pub session_timeout: Duration,
}

impl AppConfig {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }
}

/// Adapter registering the session manager into the bootstrap graph.
struct SessionComponent {
    manager: Arc<SessionManager>,
}

#[async_trait]
impl Component for SessionComponent {
    async fn init(&self) -> anyhow::Result<()> {
        self.manager.init().await.map_err(anyhow::Error::from)
    }
}

/// The page application: one per load.
pub struct App {
    bus: Arc<EventBus>,
    session: Arc<SessionManager>,
    orchestrator: Arc<Orchestrator>,
    guard: Arc<AccessGuard>,
    session_timeout: Duration,
    subscription: Mutex<Option<SubscriptionHandle>>,
    current_role: Arc<Mutex<Option<Role>>>,
    last_decision: Arc<Mutex<Option<AccessDecision>>>,
    triggers: mpsc::UnboundedSender<()>,
}

impl App {
    /// Wire the core together. `provider` is `None` when the SDK failed to
    /// load; bootstrap then surfaces `app:error` instead of a frozen page.
    ///
    /// Must be called inside a tokio runtime: the guard re-run task spawns
    /// here.
    pub fn new(
        provider: Option<Arc<dyn IdentityProvider>>,
        storage: Arc<dyn KeyValueStorage>,
        config: AppConfig,
    ) -> Arc<Self> {
        talentforge_observability::init();

        let bus = Arc::new(EventBus::new());
        let session = Arc::new(SessionManager::new(
            provider,
            storage,
            Arc::clone(&bus),
            config.location,
        ));
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&bus)));
        orchestrator.register(
            SESSION_MANAGER,
            Arc::new(SessionComponent {
                manager: Arc::clone(&session),
            }),
            [] as [&str; 0],
        );
        let guard = Arc::new(AccessGuard::new(
            Arc::clone(&session),
            RouteTable::standard(),
            Arc::clone(&bus),
        ));

        let (triggers, mut trigger_rx) = mpsc::unbounded_channel();
        let app = Arc::new(Self {
            bus,
            session,
            orchestrator,
            guard,
            session_timeout: config.session_timeout,
            subscription: Mutex::new(None),
            current_role: Arc::new(Mutex::new(None)),
            last_decision: Arc::new(Mutex::new(None)),
            triggers,
        });

        // Bus handlers are synchronous; guard evaluation is not. Forward
        // session changes into a channel consumed by one re-run task.
        {
            let triggers = app.triggers.clone();
            app.bus.on(topics::SESSION_CHANGED, move |_| {
                let _ = triggers.send(());
            });
        }
        {
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                while trigger_rx.recv().await.is_some() {
                    app.evaluate_now().await;
                }
            });
        }

        app
    }

    /// Register a feature component. Dependencies left empty are back-filled
    /// from the boot manifest.
    pub fn register_component(
        &self,
        name: &str,
        instance: Arc<dyn Component>,
        dependencies: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.orchestrator.register(name, instance, dependencies);
    }

    /// Run the page bootstrap: fixed-order component init, then the session
    /// subscription, then the first guard evaluation.
    ///
    /// This is the single catch point for init errors — the orchestrator has
    /// already emitted `app:error`; callers decide how degraded the page gets.
    pub async fn bootstrap(&self) -> anyhow::Result<()> {
        if let Err(err) = self.orchestrator.init().await {
            error!(error = %err, "bootstrap failed");
            return Err(err.into());
        }

        let handle = self
            .session
            .subscribe(SubscribeOptions {
                id: "page-bootstrap".to_string(),
                timeout: self.session_timeout,
                on_logged_in: Box::new(|session| {
                    info!(id = %session.identity.id, origin = ?session.origin, "signed in");
                }),
                on_logged_out: Box::new(|| {
                    info!("no session; continuing logged out");
                }),
            })
            .await?;
        *self.subscription.lock().expect("subscription slot poisoned") = Some(handle);

        self.evaluate_now().await;
        Ok(())
    }

    /// Run the guard against the current location and record the outcome.
    pub async fn evaluate_now(&self) -> AccessDecision {
        let location = self.session.location();
        let decision = self.guard.evaluate(&location).await;
        if let AccessDecision::Render { role } = &decision {
            *self.current_role.lock().expect("role slot poisoned") = Some(*role);
        }
        *self.last_decision.lock().expect("decision slot poisoned") = Some(decision.clone());
        decision
    }

    /// Navigate to a new location and re-run the guard.
    pub async fn navigate(&self, location: Location) -> AccessDecision {
        self.session.set_location(location);
        self.evaluate_now().await
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// The role presentation code should render for, if any page was
    /// permitted yet.
    pub fn current_role(&self) -> Option<Role> {
        *self.current_role.lock().expect("role slot poisoned")
    }

    pub fn last_decision(&self) -> Option<AccessDecision> {
        self.last_decision.lock().expect("decision slot poisoned").clone()
    }

    pub async fn current_user(&self) -> Option<Identity> {
        self.session.current_user().await
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }
}
