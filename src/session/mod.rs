//! Session provider
//!
//! Holds the current identity in a watch channel. The auth subsystem reports
//! sign-in/sign-out through `signed_in`/`signed_out`; `load` asks the backend
//! for the current session once. Subscribers get a receiver; dropping it
//! unsubscribes.

use crate::auth::Identity;
use crate::storage::AuthStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Identity resolution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial lookup still in flight
    Resolving,
    /// Lookup finished; `None` means anonymous
    Resolved(Option<Identity>),
}

impl SessionState {
    pub fn identity(&self) -> Option<Identity> {
        match self {
            SessionState::Resolved(identity) => *identity,
            SessionState::Resolving => None,
        }
    }
}

struct SessionInner {
    auth: Arc<dyn AuthStore>,
    state: watch::Sender<SessionState>,
    /// Bumped on every change so a slow `load` cannot clobber a later sign-in
    generation: AtomicU64,
    operation_timeout: Duration,
}

/// Reactive holder of the current identity.
///
/// Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct SessionProvider {
    inner: Arc<SessionInner>,
}

impl SessionProvider {
    pub fn new(auth: Arc<dyn AuthStore>, operation_timeout: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::Resolving);
        Self {
            inner: Arc::new(SessionInner {
                auth,
                state,
                generation: AtomicU64::new(0),
                operation_timeout,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state().identity()
    }

    /// Get a receiver for session changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Fetch the current session from the backend.
    ///
    /// Failures resolve to anonymous. If a sign-in/sign-out arrives while the
    /// fetch is in flight, the fetch result is dropped.
    pub async fn load(&self) -> Option<Identity> {
        let generation = self.inner.generation.load(Ordering::SeqCst);

        let identity = match timeout(
            self.inner.operation_timeout,
            self.inner.auth.current_identity(),
        )
        .await
        {
            Ok(Ok(identity)) => identity,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to load session, continuing signed out");
                None
            }
            Err(_) => {
                warn!("Session lookup timed out, continuing signed out");
                None
            }
        };

        let applied = self.inner.state.send_if_modified(|state| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            let next = SessionState::Resolved(identity);
            if *state == next {
                return false;
            }
            *state = next;
            true
        });

        if applied {
            debug!(identity = ?identity, "Session loaded");
        }
        self.identity()
    }

    /// Auth subsystem reported a sign-in
    pub fn signed_in(&self, identity: Identity) {
        info!(identity = %identity, "Signed in");
        self.set(SessionState::Resolved(Some(identity)));
    }

    /// Auth subsystem reported a sign-out
    pub fn signed_out(&self) {
        info!("Signed out");
        self.set(SessionState::Resolved(None));
    }

    fn set(&self, next: SessionState) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{async_trait, MemoryStore, StorageError};
    use tokio::sync::Notify;

    fn provider(store: Arc<MemoryStore>) -> SessionProvider {
        SessionProvider::new(store, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_initial_state_is_resolving() {
        let session = provider(Arc::new(MemoryStore::new()));
        assert_eq!(session.state(), SessionState::Resolving);
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn test_load_signed_in() {
        let store = Arc::new(MemoryStore::new());
        let user = Identity::generate();
        store.set_current_identity(Some(user));

        let session = provider(store);
        assert_eq!(session.load().await, Some(user));
        assert_eq!(session.state(), SessionState::Resolved(Some(user)));
    }

    #[tokio::test]
    async fn test_load_failure_resolves_anonymous() {
        let store = Arc::new(MemoryStore::new());
        store.set_current_identity(Some(Identity::generate()));
        store.set_offline(true);

        let session = provider(store);
        assert_eq!(session.load().await, None);
        assert_eq!(session.state(), SessionState::Resolved(None));
    }

    #[tokio::test]
    async fn test_sign_in_out_notifies_subscribers() {
        let session = provider(Arc::new(MemoryStore::new()));
        let mut rx = session.subscribe();
        let user = Identity::generate();

        session.signed_in(user);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionState::Resolved(Some(user)));

        session.signed_out();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionState::Resolved(None));
    }

    #[tokio::test]
    async fn test_repeated_sign_in_does_not_notify() {
        let session = provider(Arc::new(MemoryStore::new()));
        let user = Identity::generate();
        session.signed_in(user);

        let rx = session.subscribe();
        session.signed_in(user);
        assert!(!rx.has_changed().unwrap());
    }

    struct SlowAuth {
        release: Arc<Notify>,
        identity: Option<Identity>,
    }

    #[async_trait]
    impl AuthStore for SlowAuth {
        async fn current_identity(&self) -> Result<Option<Identity>, StorageError> {
            self.release.notified().await;
            Ok(self.identity)
        }
    }

    #[tokio::test]
    async fn test_sign_in_during_load_wins() {
        let release = Arc::new(Notify::new());
        let stale = Identity::generate();
        let auth = Arc::new(SlowAuth {
            release: release.clone(),
            identity: Some(stale),
        });
        let session = SessionProvider::new(auth, Duration::from_secs(5));

        let load = {
            let session = session.clone();
            tokio::spawn(async move { session.load().await })
        };
        tokio::task::yield_now().await;

        let user = Identity::generate();
        session.signed_in(user);
        release.notify_one();

        assert_eq!(load.await.unwrap(), Some(user));
        assert_eq!(session.identity(), Some(user));
    }
}
