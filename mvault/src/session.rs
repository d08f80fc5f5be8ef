//! Session provider
//!
//! Holds the current identity and the loading flag. The provider is an
//! explicit handle passed to whoever needs it (no process-wide global):
//! `new` → `start` (first identity check, then follow backend identity
//! notifications) → `shutdown`.

use std::sync::{Arc, Mutex, RwLock, Weak};

use chrono::Utc;
use mvault_common::events::{EventBus, VaultEvent};
use mvault_common::{Error, Identity, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{BackendResult, IdentityProvider};

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    /// True only until the first identity check resolves
    pub loading: bool,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    events: EventBus,
    state: RwLock<SessionSnapshot>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// Store `identity`; emits `SessionChanged` only on an actual change
    fn apply(&self, identity: Option<Identity>) {
        let changed = {
            let mut state = self.state.write().unwrap();
            state.loading = false;
            if state.identity == identity {
                false
            } else {
                state.identity = identity.clone();
                true
            }
        };

        if changed {
            info!(
                user_id = identity.as_ref().map(|i| i.id.as_str()).unwrap_or("-"),
                "Session identity changed"
            );
            self.events.emit_lossy(VaultEvent::SessionChanged {
                identity,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Cloneable session handle
#[derive(Clone)]
pub struct SessionProvider {
    inner: Arc<Inner>,
}

impl SessionProvider {
    pub fn new(provider: Arc<dyn IdentityProvider>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                events,
                state: RwLock::new(SessionSnapshot {
                    identity: None,
                    loading: true,
                }),
                watcher: Mutex::new(None),
            }),
        }
    }

    /// Resolve the initial identity and start following identity changes
    ///
    /// A failed check is treated as "no identity"; there is no retry.
    pub async fn start(&self) {
        let mut changes = self.inner.provider.subscribe();

        let initial = match self.inner.provider.current_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Identity check failed, continuing signed out");
                None
            }
        };
        self.inner.apply(initial);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let identity = changes.borrow_and_update().clone();
                match weak.upgrade() {
                    Some(inner) => inner.apply(identity),
                    None => break,
                }
            }
            debug!("Identity watcher stopped");
        });

        if let Some(previous) = self.inner.watcher.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    /// Stop following identity changes
    pub fn shutdown(&self) {
        if let Some(handle) = self.inner.watcher.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.inner.state.read().unwrap().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.read().unwrap().loading
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.read().unwrap().clone()
    }

    /// Current identity or `Error::NotSignedIn`
    pub fn require_identity(&self) -> Result<Identity> {
        self.current().ok_or(Error::NotSignedIn)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Identity> {
        let identity = self.inner.provider.sign_in(email, password).await?;
        self.inner.apply(Some(identity.clone()));
        Ok(identity)
    }

    /// Invalidate the backend session and clear the identity
    ///
    /// The identity is cleared even when the backend call fails.
    pub async fn sign_out(&self) -> BackendResult<()> {
        let result = self.inner.provider.sign_out().await;
        self.inner.apply(None);
        result
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut watcher) = self.watcher.lock() {
            if let Some(handle) = watcher.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::InMemoryBackend;
    use std::time::Duration;

    #[tokio::test]
    async fn test_loading_until_first_check() {
        let backend = Arc::new(InMemoryBackend::new());
        let session = SessionProvider::new(backend.clone(), EventBus::new(16));

        assert!(session.is_loading());
        assert!(session.current().is_none());

        session.start().await;
        assert!(!session.is_loading());
        assert!(session.current().is_none());
        assert!(matches!(session.require_identity(), Err(Error::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_sign_in_and_out_emit_session_changes() {
        let backend = Arc::new(InMemoryBackend::new());
        let user = backend.register_user("a@example.test", "pw");
        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        let session = SessionProvider::new(backend.clone(), events);
        session.start().await;

        assert_eq!(session.sign_in("a@example.test", "pw").await.unwrap(), user);
        match rx.recv().await.unwrap() {
            VaultEvent::SessionChanged { identity, .. } => assert_eq!(identity, Some(user.clone())),
            other => panic!("unexpected event {:?}", other),
        }

        session.sign_out().await.unwrap();
        match rx.recv().await.unwrap() {
            VaultEvent::SessionChanged { identity, .. } => assert!(identity.is_none()),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn test_follows_backend_notifications() {
        let backend = Arc::new(InMemoryBackend::new());
        let session = SessionProvider::new(backend.clone(), EventBus::new(16));
        session.start().await;

        backend.set_identity(Some(Identity::new("u9")));
        for _ in 0..50 {
            if session.current().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(session.current(), Some(Identity::new("u9")));

        session.shutdown();
    }
}
