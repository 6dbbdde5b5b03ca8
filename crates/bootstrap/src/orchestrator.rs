//! Runtime component registry with dependency-ordered, timeout-bounded init.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use talentforge_events::{AppErrorPayload, ComponentReadyPayload, EventBus, topics};

use crate::component::{Component, ComponentState};
use crate::error::BootstrapError;
use crate::manifest::BootManifest;

/// Default bound on a dependency wait. Generous on purpose: a slow network
/// session check must not be mistaken for a missing dependency.
pub const DEFAULT_DEPENDENCY_TIMEOUT: Duration = Duration::from_secs(120);

struct ComponentRecord {
    instance: Arc<dyn Component>,
    dependencies: Vec<String>,
    state: ComponentState,
}

/// Runtime component registry.
///
/// Feature modules register in arbitrary order; `init()` drives the
/// manifest's fixed order, and `init_component` recursively brings up
/// dependencies first. All mutation happens behind one mutex that is never
/// held across an await.
pub struct Orchestrator {
    bus: Arc<EventBus>,
    manifest: BootManifest,
    dependency_timeout: Duration,
    records: Mutex<HashMap<String, ComponentRecord>>,
    // One watch channel per component name, created on first interest so a
    // waiter may park before the component ever registers.
    ready: Mutex<HashMap<String, watch::Sender<bool>>>,
    // Concurrent top-level `init()` callers park on this and share one pass.
    run_gate: tokio::sync::Mutex<bool>,
}

impl Orchestrator {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_manifest(bus, BootManifest::standard())
    }

    pub fn with_manifest(bus: Arc<EventBus>, manifest: BootManifest) -> Self {
        Self {
            bus,
            manifest,
            dependency_timeout: DEFAULT_DEPENDENCY_TIMEOUT,
            records: Mutex::new(HashMap::new()),
            ready: Mutex::new(HashMap::new()),
            run_gate: tokio::sync::Mutex::new(false),
        }
    }

    pub fn with_dependency_timeout(mut self, timeout: Duration) -> Self {
        self.dependency_timeout = timeout;
        self
    }

    /// Register a component under `name`.
    ///
    /// Idempotent per name: re-registering before the component started
    /// overwrites the pending record; re-registering once it is ready (or
    /// mid-init) is a no-op warning.
    pub fn register(
        &self,
        name: &str,
        instance: Arc<dyn Component>,
        dependencies: impl IntoIterator<Item = impl Into<String>>,
    ) {
        let dependencies: Vec<String> = dependencies.into_iter().map(Into::into).collect();
        let mut records = self.records.lock().expect("component registry poisoned");
        if let Some(existing) = records.get(name) {
            if existing.state != ComponentState::Registered {
                warn!(component = name, state = ?existing.state, "ignoring re-registration");
                return;
            }
            debug!(component = name, "overwriting pending registration");
        }
        records.insert(
            name.to_string(),
            ComponentRecord {
                instance,
                dependencies,
                state: ComponentState::Registered,
            },
        );
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.records
            .lock()
            .map(|r| r.contains_key(name))
            .unwrap_or(false)
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.records
            .lock()
            .map(|r| r.get(name).is_some_and(|rec| rec.state == ComponentState::Ready))
            .unwrap_or(false)
    }

    /// Block (bounded) until `name` reports ready.
    ///
    /// Waiters subscribe to the component's watch channel rather than
    /// polling; the channel flips when the component's own `init()` returns.
    pub async fn wait_for_component(&self, name: &str, timeout: Duration) -> Result<(), BootstrapError> {
        let mut rx = self.ready_channel(name).subscribe();
        let wait = async {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Sender dropped means the orchestrator itself is gone;
                    // park until the timeout fires.
                    std::future::pending::<()>().await;
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| BootstrapError::ComponentTimeout {
                name: name.to_string(),
                waited: timeout,
            })
    }

    /// Initialize one component, bringing up its registered dependencies
    /// first and waiting (bounded) for each of them to report ready.
    ///
    /// Already-ready components return immediately. A failing `init()`
    /// leaves the component not-ready and propagates; no automatic retry.
    pub async fn init_component(&self, name: &str) -> Result<(), BootstrapError> {
        self.init_component_boxed(name.to_string()).await
    }

    fn init_component_boxed(
        &self,
        name: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), BootstrapError>> + Send + '_>> {
        Box::pin(async move {
            // Claim the init or decide to wait on someone else's.
            let claimed = {
                let mut records = self.records.lock().expect("component registry poisoned");
                match records.get_mut(&name) {
                    None => return Err(BootstrapError::UnknownComponent { name }),
                    Some(rec) => match rec.state {
                        ComponentState::Ready => return Ok(()),
                        ComponentState::Initializing => None,
                        ComponentState::Registered => {
                            rec.state = ComponentState::Initializing;
                            Some((Arc::clone(&rec.instance), rec.dependencies.clone()))
                        }
                    },
                }
            };

            let Some((instance, dependencies)) = claimed else {
                // Another caller is driving this init; wait for its outcome.
                return self.wait_for_component(&name, self.dependency_timeout).await;
            };

            for dep in &dependencies {
                // Drive registered idle dependencies ourselves; either way the
                // wait below bounds how long an unregistered or in-flight
                // dependency may hold us up.
                if self.dependency_is_idle(dep) {
                    if let Err(err) = self.init_component_boxed(dep.clone()).await {
                        self.release_claim(&name);
                        return Err(err);
                    }
                }
                if let Err(err) = self.wait_for_component(dep, self.dependency_timeout).await {
                    self.release_claim(&name);
                    return Err(err);
                }
            }

            debug!(component = %name, "initializing");
            match instance.init().await {
                Ok(()) => {
                    self.mark_ready(&name);
                    info!(component = %name, "ready");
                    Ok(())
                }
                Err(error) => {
                    self.release_claim(&name);
                    error!(component = %name, error = %format!("{error:#}"), "init failed");
                    Err(BootstrapError::InitFailed { name, error })
                }
            }
        })
    }

    /// Run the full fixed order from the manifest. One pass per page:
    /// concurrent callers share the in-flight pass, later callers no-op.
    ///
    /// Emits `app:ready` on completion; on the first component failure emits
    /// `app:error` and returns the error without attempting later components.
    pub async fn init(&self) -> Result<(), BootstrapError> {
        let mut completed = self.run_gate.lock().await;
        if *completed {
            debug!("bootstrap already completed; ignoring");
            return Ok(());
        }

        self.apply_manifest_dependencies();

        let order: Vec<String> = self.manifest.order().map(str::to_string).collect();
        for name in order {
            if !self.is_registered(&name) {
                debug!(component = %name, "never registered; skipping");
                continue;
            }
            if let Err(err) = self.init_component(&name).await {
                self.bus.emit(
                    topics::APP_ERROR,
                    AppErrorPayload {
                        error: err.to_string(),
                    },
                );
                return Err(err);
            }
        }

        *completed = true;
        self.bus.emit(topics::APP_READY, json!({}));
        info!("bootstrap complete");
        Ok(())
    }

    /// Back-fill conventional dependencies from the manifest for any
    /// registration that declared none of its own.
    fn apply_manifest_dependencies(&self) {
        let mut records = self.records.lock().expect("component registry poisoned");
        for (name, rec) in records.iter_mut() {
            if rec.state == ComponentState::Registered && rec.dependencies.is_empty() {
                if let Some(deps) = self.manifest.dependencies_of(name) {
                    if !deps.is_empty() {
                        debug!(component = %name, ?deps, "attaching manifest dependencies");
                        rec.dependencies = deps.to_vec();
                    }
                }
            }
        }
    }

    fn dependency_is_idle(&self, name: &str) -> bool {
        self.records
            .lock()
            .map(|r| r.get(name).is_some_and(|rec| rec.state == ComponentState::Registered))
            .unwrap_or(false)
    }

    fn mark_ready(&self, name: &str) {
        if let Ok(mut records) = self.records.lock() {
            if let Some(rec) = records.get_mut(name) {
                rec.state = ComponentState::Ready;
            }
        }
        // send_replace, not send: the flip must stick even when nobody has
        // subscribed yet, so a later waiter sees it via borrow_and_update.
        self.ready_channel(name).send_replace(true);
        self.bus.emit(
            topics::COMPONENT_READY,
            ComponentReadyPayload {
                name: name.to_string(),
            },
        );
    }

    fn release_claim(&self, name: &str) {
        if let Ok(mut records) = self.records.lock() {
            if let Some(rec) = records.get_mut(name) {
                if rec.state == ComponentState::Initializing {
                    rec.state = ComponentState::Registered;
                }
            }
        }
    }

    fn ready_channel(&self, name: &str) -> watch::Sender<bool> {
        let mut channels = self.ready.lock().expect("ready channel map poisoned");
        channels
            .entry(name.to_string())
            .or_insert_with(|| watch::channel(false).0)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Probe {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        inits: AtomicUsize,
        fail: bool,
    }

    impl Probe {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                log: Arc::clone(log),
                inits: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                log: Arc::clone(log),
                inits: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    #[async_trait::async_trait]
    impl Component for Probe {
        async fn init(&self) -> anyhow::Result<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("{} exploded", self.name);
            }
            self.log.lock().unwrap().push(self.name);
            Ok(())
        }
    }

    fn manifest(entries: &[(&str, &[&str])]) -> BootManifest {
        let mut m = BootManifest::new();
        for (name, deps) in entries {
            m.push(*name, deps.iter().copied());
        }
        m
    }

    fn orchestrator(entries: &[(&str, &[&str])]) -> Orchestrator {
        Orchestrator::with_manifest(Arc::new(EventBus::new()), manifest(entries))
            .with_dependency_timeout(Duration::from_millis(200))
    }

    #[tokio::test(start_paused = true)]
    async fn deps_ready_before_dependent_init() {
        // Fixed order deliberately lists the dependent first; the recursive
        // dependency drive must still bring up "session" before "dash".
        let orch = orchestrator(&[("dash", &["session"]), ("session", &[])]);
        let log = Arc::new(Mutex::new(Vec::new()));
        orch.register("dash", Probe::new("dash", &log), ["session"]);
        orch.register("session", Probe::new("session", &log), [] as [&str; 0]);

        orch.init().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["session", "dash"]);
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_flipped_before_any_waiter_is_still_observed() {
        // The watch value must stick even while nobody is subscribed, so a
        // waiter arriving after the flip resolves instead of timing out.
        let orch = orchestrator(&[("session", &[])]);
        let log = Arc::new(Mutex::new(Vec::new()));
        orch.register("session", Probe::new("session", &log), [] as [&str; 0]);

        orch.init_component("session").await.unwrap();
        orch.wait_for_component("session", Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn registration_order_does_not_matter() {
        let orch = orchestrator(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);
        let log = Arc::new(Mutex::new(Vec::new()));
        // Register in reverse.
        orch.register("c", Probe::new("c", &log), ["b"]);
        orch.register("b", Probe::new("b", &log), ["a"]);
        orch.register("a", Probe::new("a", &log), [] as [&str; 0]);

        orch.init().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn init_runs_each_component_at_most_once() {
        let orch = orchestrator(&[("a", &[]), ("b", &["a"])]);
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Probe::new("a", &log);
        let b = Probe::new("b", &log);
        orch.register("a", Arc::clone(&a) as Arc<dyn Component>, [] as [&str; 0]);
        orch.register("b", Arc::clone(&b) as Arc<dyn Component>, ["a"]);

        let (first, second) = tokio::join!(orch.init(), orch.init());
        first.unwrap();
        second.unwrap();
        orch.init().await.unwrap();

        assert_eq!(a.inits.load(Ordering::SeqCst), 1);
        assert_eq!(b.inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_dependency_times_out() {
        let orch = orchestrator(&[("dash", &["ghost"])]);
        let log = Arc::new(Mutex::new(Vec::new()));
        orch.register("dash", Probe::new("dash", &log), ["ghost"]);

        let err = orch.init().await.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err}");
        assert!(!orch.is_ready("dash"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_stops_the_fixed_order_and_emits_app_error() {
        let bus = Arc::new(EventBus::new());
        let errors = Arc::new(Mutex::new(Vec::new()));
        {
            let errors = Arc::clone(&errors);
            bus.on(topics::APP_ERROR, move |payload| {
                errors.lock().unwrap().push(payload.clone());
            });
        }

        let orch = Orchestrator::with_manifest(bus, manifest(&[("bad", &[]), ("late", &[])]))
            .with_dependency_timeout(Duration::from_millis(200));
        let log = Arc::new(Mutex::new(Vec::new()));
        let late = Probe::new("late", &log);
        orch.register("bad", Probe::failing("bad", &log), [] as [&str; 0]);
        orch.register("late", Arc::clone(&late) as Arc<dyn Component>, [] as [&str; 0]);

        let err = orch.init().await.unwrap_err();
        assert!(matches!(err, BootstrapError::InitFailed { ref name, .. } if name == "bad"));
        assert_eq!(late.inits.load(Ordering::SeqCst), 0);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn skips_components_that_never_registered() {
        let orch = orchestrator(&[("a", &[]), ("never", &[]), ("b", &[])]);
        let log = Arc::new(Mutex::new(Vec::new()));
        orch.register("a", Probe::new("a", &log), [] as [&str; 0]);
        orch.register("b", Probe::new("b", &log), [] as [&str; 0]);

        orch.init().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn reregistration_after_ready_is_a_noop() {
        let orch = orchestrator(&[("a", &[])]);
        let log = Arc::new(Mutex::new(Vec::new()));
        let original = Probe::new("a", &log);
        orch.register("a", Arc::clone(&original) as Arc<dyn Component>, [] as [&str; 0]);
        orch.init().await.unwrap();

        let replacement = Probe::new("a", &log);
        orch.register("a", Arc::clone(&replacement) as Arc<dyn Component>, [] as [&str; 0]);
        orch.init_component("a").await.unwrap();

        assert_eq!(original.inits.load(Ordering::SeqCst), 1);
        assert_eq!(replacement.inits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reregistration_before_start_overwrites() {
        let orch = orchestrator(&[("a", &[])]);
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = Probe::new("a", &log);
        let second = Probe::new("a", &log);
        orch.register("a", Arc::clone(&first) as Arc<dyn Component>, [] as [&str; 0]);
        orch.register("a", Arc::clone(&second) as Arc<dyn Component>, [] as [&str; 0]);

        orch.init().await.unwrap();
        assert_eq!(first.inits.load(Ordering::SeqCst), 0);
        assert_eq!(second.inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manifest_backfills_conventional_dependencies() {
        let orch = orchestrator(&[("session", &[]), ("dash", &["session"])]);
        let log = Arc::new(Mutex::new(Vec::new()));
        // "dash" registers without declaring its dependency.
        orch.register("dash", Probe::new("dash", &log), [] as [&str; 0]);
        orch.register("session", Probe::new("session", &log), [] as [&str; 0]);

        orch.init().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["session", "dash"]);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_events_are_emitted_per_component_then_app_ready() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            bus.on(topics::COMPONENT_READY, move |p| {
                seen.lock()
                    .unwrap()
                    .push(p["name"].as_str().unwrap_or_default().to_string());
            });
        }
        let ready = Arc::new(AtomicUsize::new(0));
        {
            let ready = Arc::clone(&ready);
            bus.on(topics::APP_READY, move |_| {
                ready.fetch_add(1, Ordering::SeqCst);
            });
        }

        let orch = Orchestrator::with_manifest(bus, manifest(&[("a", &[]), ("b", &["a"])]))
            .with_dependency_timeout(Duration::from_millis(200));
        let log = Arc::new(Mutex::new(Vec::new()));
        orch.register("a", Probe::new("a", &log), [] as [&str; 0]);
        orch.register("b", Probe::new("b", &log), ["a"]);

        orch.init().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ready.load(Ordering::SeqCst), 1);

        // A second pass is a no-op: no duplicate app:ready.
        orch.init().await.unwrap();
        assert_eq!(ready.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_component_resolves_when_ready_flips() {
        let orch = Arc::new(orchestrator(&[("a", &[])]));
        let log = Arc::new(Mutex::new(Vec::new()));
        orch.register("a", Probe::new("a", &log), [] as [&str; 0]);

        let waiter = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.wait_for_component("a", Duration::from_secs(5)).await })
        };
        orch.init_component("a").await.unwrap();
        waiter.await.unwrap().unwrap();
    }
}
