//! Identity provider contract.
//!
//! The external identity/document-store service is consumed through this
//! narrow trait. Every call has exactly two observable outcomes: success
//! with an identity (or document), or failure/absent. The in-memory
//! implementation backs tests and demo/dev runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use talentforge_core::{Identity, IdentityId, Profile};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider SDK object is missing or not reachable.
    #[error("identity provider unavailable")]
    Unavailable,

    /// A provider call failed (network, quota, permission).
    #[error("provider call failed: {0}")]
    Call(String),
}

/// Callback invoked on every identity state change. `None` means the
/// provider considers the user logged out.
pub type IdentityListener = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

/// Deregistration handle for an identity listener. Dropping it removes the
/// listener; `unregister()` does the same explicitly.
pub struct ListenerGuard {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerGuard {
    pub fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    pub fn unregister(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl core::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("armed", &self.remove.is_some())
            .finish()
    }
}

/// The identity/document-store provider, as the session core sees it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The provider's live notion of the current user.
    async fn current_identity(&self) -> Result<Option<Identity>, ProviderError>;

    /// Credential-less sign-in used by the demo flow.
    async fn sign_in_anonymously(&self) -> Result<Identity, ProviderError>;

    /// Clear the provider-side session. Listeners observe the resulting
    /// `None` through their state-change callback.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Register for identity state changes. The listener fires on every
    /// subsequent change until the guard is dropped.
    fn on_identity_change(&self, listener: IdentityListener) -> ListenerGuard;

    /// Read the profile document keyed by identity id.
    async fn fetch_profile(&self, id: &IdentityId) -> Result<Option<Profile>, ProviderError>;

    /// Write the profile document keyed by identity id.
    async fn store_profile(&self, id: &IdentityId, profile: &Profile) -> Result<(), ProviderError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory provider
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ProviderState {
    available: bool,
    current: Option<Identity>,
    listeners: Vec<(u64, IdentityListener)>,
    next_listener: u64,
    profiles: HashMap<String, Profile>,
    anonymous_sign_ins: u64,
}

/// In-memory provider for tests and demo/dev runs.
///
/// State changes notify listeners synchronously, mirroring how a real SDK
/// fires its callback on the same event loop.
#[derive(Clone)]
pub struct InMemoryIdentityProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState {
                available: true,
                ..ProviderState::default()
            })),
        }
    }

    /// A provider whose SDK "failed to load": every call errors.
    pub fn unavailable() -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState::default())),
        }
    }

    /// Test hook: set the current identity and notify listeners, as if the
    /// provider's own session state changed.
    pub fn set_identity(&self, identity: Option<Identity>) {
        let listeners = {
            let mut state = self.state.lock().expect("provider state poisoned");
            state.current = identity.clone();
            state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect::<Vec<_>>()
        };
        for listener in listeners {
            listener(identity.clone());
        }
    }

    /// Test hook: number of anonymous sign-ins performed.
    pub fn anonymous_sign_ins(&self) -> u64 {
        self.state.lock().map(|s| s.anonymous_sign_ins).unwrap_or(0)
    }

    /// Seed a profile document (test hook).
    pub fn seed_profile(&self, id: &IdentityId, profile: Profile) {
        if let Ok(mut state) = self.state.lock() {
            state.profiles.insert(id.as_str().to_string(), profile);
        }
    }

    fn check_available(&self) -> Result<(), ProviderError> {
        let available = self.state.lock().map(|s| s.available).unwrap_or(false);
        if available { Ok(()) } else { Err(ProviderError::Unavailable) }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn current_identity(&self) -> Result<Option<Identity>, ProviderError> {
        self.check_available()?;
        Ok(self.state.lock().map(|s| s.current.clone()).unwrap_or(None))
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, ProviderError> {
        self.check_available()?;
        let identity = Identity::anonymous(IdentityId::generate());
        if let Ok(mut state) = self.state.lock() {
            state.anonymous_sign_ins += 1;
        }
        debug!(id = %identity.id, "anonymous sign-in");
        self.set_identity(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.check_available()?;
        self.set_identity(None);
        Ok(())
    }

    fn on_identity_change(&self, listener: IdentityListener) -> ListenerGuard {
        let id = {
            let mut state = self.state.lock().expect("provider state poisoned");
            let id = state.next_listener;
            state.next_listener += 1;
            state.listeners.push((id, listener));
            id
        };
        let state = Arc::clone(&self.state);
        ListenerGuard::new(move || {
            if let Ok(mut state) = state.lock() {
                state.listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }

    async fn fetch_profile(&self, id: &IdentityId) -> Result<Option<Profile>, ProviderError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .map(|s| s.profiles.get(id.as_str()).cloned())
            .unwrap_or(None))
    }

    async fn store_profile(&self, id: &IdentityId, profile: &Profile) -> Result<(), ProviderError> {
        self.check_available()?;
        let mut state = self.state.lock().map_err(|_| ProviderError::Call("state poisoned".into()))?;
        state.profiles.insert(id.as_str().to_string(), profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn listeners_observe_changes_until_deregistered() {
        let provider = InMemoryIdentityProvider::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let guard = {
            let hits = Arc::clone(&hits);
            provider.on_identity_change(Arc::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }))
        };

        provider.set_identity(Some(Identity::real(IdentityId::new("u1"), "a@b.c")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        guard.unregister();
        provider.set_identity(None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unavailable_provider_errors_every_call() {
        let provider = InMemoryIdentityProvider::unavailable();
        assert_eq!(provider.current_identity().await, Err(ProviderError::Unavailable));
        assert!(provider.sign_in_anonymously().await.is_err());
    }

    #[tokio::test]
    async fn anonymous_sign_in_sets_current() {
        let provider = InMemoryIdentityProvider::new();
        let identity = provider.sign_in_anonymously().await.unwrap();
        assert!(identity.anonymous);
        assert_eq!(provider.current_identity().await.unwrap(), Some(identity));
        assert_eq!(provider.anonymous_sign_ins(), 1);
    }

    #[tokio::test]
    async fn profiles_round_trip() {
        let provider = InMemoryIdentityProvider::new();
        let id = IdentityId::new("u1");
        assert_eq!(provider.fetch_profile(&id).await.unwrap(), None);

        let profile = Profile {
            role: Some(talentforge_core::Role::Employer),
            display_name: Some("Acme".into()),
            email: None,
        };
        provider.store_profile(&id, &profile).await.unwrap();
        assert_eq!(provider.fetch_profile(&id).await.unwrap(), Some(profile));
    }
}
