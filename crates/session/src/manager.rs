//! The session manager: one authoritative identity under racing signals.
//!
//! Within one subscription the first of {provider callback, timeout timer,
//! demo/dev short-circuit} to land wins; the settle slot turns every later
//! terminal signal into a no-op. Later identity *changes* still update the
//! current session and re-trigger interested parties through the bus — they
//! just never re-fire the subscription's one-shot callbacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use talentforge_core::{Identity, IdentityId, KeyValueStorage, Location};
use talentforge_events::{EventBus, SessionChangedPayload, topics};

use crate::demo::{self, DemoSessionRecord};
use crate::provider::{IdentityProvider, ProviderError};

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Where the current session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Provider-issued credentialed session.
    Real,
    /// Fresh anonymous sign-in from a `?demo=true` link.
    DemoAnonymous,
    /// Restored from the cached demo session record.
    DemoCached,
    /// Forged locally from a `?dev=true` link; the provider never saw it.
    DevForced,
}

impl SessionOrigin {
    /// Demo and dev sessions get the relaxed dashboard access check.
    pub fn is_demo_or_dev(&self) -> bool {
        !matches!(self, SessionOrigin::Real)
    }
}

/// The authoritative session. Replaced wholesale on every change, never
/// mutated in place; read-only outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    pub origin: SessionOrigin,
    pub obtained_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The provider SDK object is absent or not reachable. Fatal to init.
    #[error("identity provider unavailable")]
    ProviderUnavailable,

    /// `subscribe` was called before `init` completed.
    #[error("session manager is not initialized")]
    NotReady,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Settle slot
// ─────────────────────────────────────────────────────────────────────────────

pub type LoggedInCallback = Box<dyn FnOnce(Session) + Send>;
pub type LoggedOutCallback = Box<dyn FnOnce() + Send>;

/// Terminal state of a subscription. One transition out of `Pending`, ever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettleState {
    Pending,
    LoggedIn,
    LoggedOut,
    Cancelled,
}

struct SettleSlot {
    state: SettleState,
    on_logged_in: Option<LoggedInCallback>,
    on_logged_out: Option<LoggedOutCallback>,
}

/// Shared handle to one subscription's settle slot.
///
/// All terminal signals funnel through `settle_logged_in`/`settle_logged_out`;
/// the single transition guard is the mutex plus the `Pending` check, so
/// firing both callbacks (or one twice) is impossible by construction.
#[derive(Clone)]
struct SettleHandle {
    label: Arc<str>,
    slot: Arc<Mutex<SettleSlot>>,
    current: Arc<Mutex<Option<Session>>>,
    bus: Arc<EventBus>,
}

impl SettleHandle {
    fn new(
        label: &str,
        on_logged_in: LoggedInCallback,
        on_logged_out: LoggedOutCallback,
        current: Arc<Mutex<Option<Session>>>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            label: Arc::from(label),
            slot: Arc::new(Mutex::new(SettleSlot {
                state: SettleState::Pending,
                on_logged_in: Some(on_logged_in),
                on_logged_out: Some(on_logged_out),
            })),
            current,
            bus,
        }
    }

    /// Settle with a session. Returns false (and does nothing) if the slot
    /// already left `Pending`.
    fn settle_logged_in(&self, session: Session) -> bool {
        let callback = {
            let mut slot = self.slot.lock().expect("settle slot poisoned");
            if slot.state != SettleState::Pending {
                return false;
            }
            slot.state = SettleState::LoggedIn;
            slot.on_logged_out = None;
            slot.on_logged_in.take()
        };
        debug!(subscription = %self.label, id = %session.identity.id, "settled logged-in");
        self.replace_session(Some(session.clone()));
        if let Some(callback) = callback {
            callback(session);
        }
        true
    }

    /// Settle logged-out. Returns false if the slot already left `Pending`.
    fn settle_logged_out(&self) -> bool {
        let callback = {
            let mut slot = self.slot.lock().expect("settle slot poisoned");
            if slot.state != SettleState::Pending {
                return false;
            }
            slot.state = SettleState::LoggedOut;
            slot.on_logged_in = None;
            slot.on_logged_out.take()
        };
        debug!(subscription = %self.label, "settled logged-out");
        self.replace_session(None);
        if let Some(callback) = callback {
            callback();
        }
        true
    }

    /// Tear down a still-pending slot without firing either callback.
    fn cancel(&self) {
        let mut slot = self.slot.lock().expect("settle slot poisoned");
        if slot.state == SettleState::Pending {
            slot.state = SettleState::Cancelled;
            slot.on_logged_in = None;
            slot.on_logged_out = None;
        }
    }

    /// Swap the authoritative session and announce the change on the bus.
    fn replace_session(&self, session: Option<Session>) {
        let identity_id = session.as_ref().map(|s| s.identity.id.as_str().to_string());
        *self.current.lock().expect("session slot poisoned") = session;
        self.bus
            .emit(topics::SESSION_CHANGED, SessionChangedPayload { identity_id });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscriptions
// ─────────────────────────────────────────────────────────────────────────────

pub struct SubscribeOptions {
    /// Label for logs; carries no semantics.
    pub id: String,
    /// How long to wait for a provider callback before treating the user as
    /// logged out. A slow or absent network session is "logged out", not
    /// "still loading" forever.
    pub timeout: Duration,
    pub on_logged_in: LoggedInCallback,
    pub on_logged_out: LoggedOutCallback,
}

struct ActiveSubscription {
    serial: u64,
    settle: SettleHandle,
    timer: Option<JoinHandle<()>>,
    // Held for Drop only: dropping the guard removes the provider listener.
    _listener: Option<crate::provider::ListenerGuard>,
}

impl ActiveSubscription {
    fn teardown(mut self) {
        // Cancel before aborting so a timer mid-fire no-ops instead of
        // settling a subscription that is being replaced.
        self.settle.cancel();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        // Dropping the guard removes the provider listener.
    }
}

/// Unsubscribe handle returned by [`SessionManager::subscribe`]. Cancelling
/// clears the timer and drops the provider listener; it is the only
/// cancellation mechanism.
pub struct SubscriptionHandle {
    serial: u64,
    active: Arc<Mutex<Option<ActiveSubscription>>>,
}

impl SubscriptionHandle {
    pub fn cancel(&self) {
        let sub = {
            let mut active = self.active.lock().expect("active subscription poisoned");
            match &*active {
                Some(current) if current.serial == self.serial => active.take(),
                _ => None,
            }
        };
        if let Some(sub) = sub {
            sub.teardown();
        }
    }
}

impl core::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("serial", &self.serial)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Manager
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Uninitialized,
    Ready,
}

/// Owns the single authoritative session.
pub struct SessionManager {
    provider: Option<Arc<dyn IdentityProvider>>,
    storage: Arc<dyn KeyValueStorage>,
    bus: Arc<EventBus>,
    location: Mutex<Location>,
    state: Mutex<ManagerState>,
    current: Arc<Mutex<Option<Session>>>,
    active: Arc<Mutex<Option<ActiveSubscription>>>,
    serial: AtomicU64,
}

impl SessionManager {
    /// `provider` is `None` when the SDK failed to load; `init` then fails
    /// with [`SessionError::ProviderUnavailable`].
    pub fn new(
        provider: Option<Arc<dyn IdentityProvider>>,
        storage: Arc<dyn KeyValueStorage>,
        bus: Arc<EventBus>,
        location: Location,
    ) -> Self {
        Self {
            provider,
            storage,
            bus,
            location: Mutex::new(location),
            state: Mutex::new(ManagerState::Uninitialized),
            current: Arc::new(Mutex::new(None)),
            active: Arc::new(Mutex::new(None)),
            serial: AtomicU64::new(0),
        }
    }

    /// Verify the provider is present and reachable, then flip to ready.
    /// Idempotent: a second call is a debug-level no-op.
    pub async fn init(&self) -> Result<(), SessionError> {
        if *self.state.lock().expect("manager state poisoned") == ManagerState::Ready {
            debug!("session manager already initialized");
            return Ok(());
        }
        let provider = self
            .provider
            .clone()
            .ok_or(SessionError::ProviderUnavailable)?;
        if provider.current_identity().await.is_err() {
            return Err(SessionError::ProviderUnavailable);
        }
        *self.state.lock().expect("manager state poisoned") = ManagerState::Ready;
        info!("session manager ready");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.state
            .lock()
            .map(|s| *s == ManagerState::Ready)
            .unwrap_or(false)
    }

    /// Arm a new subscription, tearing down any previous one first. Exactly
    /// one of `on_logged_in`/`on_logged_out` fires for the returned
    /// subscription, whichever of the racing signals lands first.
    pub async fn subscribe(&self, opts: SubscribeOptions) -> Result<SubscriptionHandle, SessionError> {
        if !self.is_ready() {
            return Err(SessionError::NotReady);
        }
        let provider = self
            .provider
            .clone()
            .ok_or(SessionError::ProviderUnavailable)?;

        // Only one active subscription at a time: the previous one is fully
        // torn down (timer cancelled, provider listener dropped) before the
        // new one arms, so no stale timer can settle against this one.
        if let Some(prev) = self.active.lock().expect("active subscription poisoned").take() {
            debug!(serial = prev.serial, "tearing down previous subscription");
            prev.teardown();
        }

        let serial = self.serial.fetch_add(1, Ordering::SeqCst);
        let settle = SettleHandle::new(
            &opts.id,
            opts.on_logged_in,
            opts.on_logged_out,
            Arc::clone(&self.current),
            Arc::clone(&self.bus),
        );
        let location = self.location();

        // Dev override: forge a local identity, provider untouched.
        if location.dev_flag() && location.query_role().is_some() {
            info!(subscription = %opts.id, "dev flag present; forcing local identity");
            let session = Session {
                identity: Identity::anonymous(IdentityId::generate()),
                origin: SessionOrigin::DevForced,
                obtained_at: Utc::now(),
            };
            settle.settle_logged_in(session);
            return Ok(self.store_active(serial, settle, None, None));
        }

        // Demo flow: anonymous sign-in settles immediately, bypassing the
        // provider callback entirely. Failure falls through to the normal
        // callback-vs-timer race.
        if location.demo_flag() && location.query_role().is_some() {
            match provider.sign_in_anonymously().await {
                Ok(identity) => {
                    let role = location.query_role().unwrap_or_default();
                    let record = DemoSessionRecord::new(
                        identity.id.as_str(),
                        format!("demo-{role}@talentforge.dev"),
                        Utc::now(),
                    );
                    demo::write(self.storage.as_ref(), &record);
                    info!(subscription = %opts.id, %role, "demo sign-in complete");
                    settle.settle_logged_in(Session {
                        identity,
                        origin: SessionOrigin::DemoAnonymous,
                        obtained_at: Utc::now(),
                    });
                    return Ok(self.store_active(serial, settle, None, None));
                }
                Err(err) => {
                    warn!(%err, "demo sign-in failed; falling back to provider callback");
                }
            }
        }

        // Timer: if no provider callback settles us within the budget, the
        // user is logged out. The settle guard makes a late timer a no-op.
        // The Sleep is constructed here so the deadline counts from the
        // subscribe call, not from whenever the spawned task is first polled.
        let timer = {
            let settle = settle.clone();
            let sleep = tokio::time::sleep(opts.timeout);
            tokio::spawn(async move {
                sleep.await;
                if settle.settle_logged_out() {
                    debug!("subscription timed out; treating as logged out");
                }
            })
        };

        // Provider callback: identity settles logged-in; null re-checks the
        // cached demo record first (a parallel demo flow may have written it
        // after this subscription started). After settle, changes keep
        // updating the authoritative session without re-firing callbacks.
        let listener = {
            let settle = settle.clone();
            let storage = Arc::clone(&self.storage);
            provider.on_identity_change(Arc::new(move |change: Option<Identity>| match change {
                Some(identity) => {
                    let origin = if identity.anonymous {
                        SessionOrigin::DemoAnonymous
                    } else {
                        SessionOrigin::Real
                    };
                    let session = Session {
                        identity,
                        origin,
                        obtained_at: Utc::now(),
                    };
                    if !settle.settle_logged_in(session.clone()) {
                        settle.replace_session(Some(session));
                    }
                }
                None => match demo::read(storage.as_ref(), Utc::now()) {
                    Some(record) => {
                        let mut identity = Identity::anonymous(IdentityId::new(record.identity_id));
                        identity.email = Some(record.email);
                        let session = Session {
                            identity,
                            origin: SessionOrigin::DemoCached,
                            obtained_at: Utc::now(),
                        };
                        if !settle.settle_logged_in(session.clone()) {
                            settle.replace_session(Some(session));
                        }
                    }
                    None => {
                        if !settle.settle_logged_out() {
                            settle.replace_session(None);
                        }
                    }
                },
            }))
        };

        Ok(self.store_active(serial, settle, Some(timer), Some(listener)))
    }

    fn store_active(
        &self,
        serial: u64,
        settle: SettleHandle,
        timer: Option<JoinHandle<()>>,
        listener: Option<crate::provider::ListenerGuard>,
    ) -> SubscriptionHandle {
        *self.active.lock().expect("active subscription poisoned") = Some(ActiveSubscription {
            serial,
            settle,
            timer,
            _listener: listener,
        });
        SubscriptionHandle {
            serial,
            active: Arc::clone(&self.active),
        }
    }

    /// The session the last `on_logged_in` carried, if any.
    pub fn current_session(&self) -> Option<Session> {
        self.current.lock().expect("session slot poisoned").clone()
    }

    /// Settled identity, falling back to the provider's live value.
    pub async fn current_user(&self) -> Option<Identity> {
        if let Some(session) = self.current_session() {
            return Some(session.identity);
        }
        match &self.provider {
            Some(provider) => provider.current_identity().await.ok().flatten(),
            None => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_session().is_some()
    }

    /// Clear the provider session and the cached demo record. Does not fire
    /// `on_logged_out` itself — the provider callback does that.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        // The record goes first so the callback's demo re-check cannot
        // resurrect the session we are tearing down.
        demo::clear(self.storage.as_ref());
        let provider = self
            .provider
            .clone()
            .ok_or(SessionError::ProviderUnavailable)?;
        provider.sign_out().await?;
        // Demo/dev short-circuits never registered a provider listener, so
        // the callback above may not have cleared the session. Do it here if
        // it is still standing; the emit mirrors what the listener would do.
        let lingering = self
            .current
            .lock()
            .expect("session slot poisoned")
            .take()
            .is_some();
        if lingering {
            self.bus
                .emit(topics::SESSION_CHANGED, SessionChangedPayload { identity_id: None });
        }
        Ok(())
    }

    /// Pure read of the cached demo record; expired records are purged.
    pub fn check_demo_auth(&self) -> Option<DemoSessionRecord> {
        demo::read(self.storage.as_ref(), Utc::now())
    }

    pub fn provider(&self) -> Option<Arc<dyn IdentityProvider>> {
        self.provider.clone()
    }

    pub fn location(&self) -> Location {
        self.location.lock().expect("location poisoned").clone()
    }

    /// Update the manager's view of the current navigation.
    pub fn set_location(&self, location: Location) {
        *self.location.lock().expect("location poisoned") = location;
    }
}
