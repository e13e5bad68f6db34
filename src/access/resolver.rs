//! Role resolution for the current identity
//!
//! Each fetch is tagged with the identity it was issued for and a generation
//! number. A completion only lands if the state is still `Fetching` with the
//! same generation, so a slow response for a previous identity can never be
//! attributed to the current one.

use crate::auth::{Identity, Role, RoleSet};
use crate::session::SessionState;
use crate::storage::RoleStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Role fetch state for the current identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleState {
    /// No identity
    Idle,
    /// Lookup in flight
    Fetching { identity: Identity, generation: u64 },
    /// Lookup succeeded
    Resolved {
        identity: Identity,
        generation: u64,
        roles: RoleSet,
    },
    /// Lookup failed; treated as holding no roles
    Failed { identity: Identity, generation: u64 },
}

impl RoleState {
    pub fn identity(&self) -> Option<Identity> {
        match self {
            RoleState::Idle => None,
            RoleState::Fetching { identity, .. }
            | RoleState::Resolved { identity, .. }
            | RoleState::Failed { identity, .. } => Some(*identity),
        }
    }

    /// Generation of the fetch that produced this state (0 when idle)
    pub fn generation(&self) -> u64 {
        match self {
            RoleState::Idle => 0,
            RoleState::Fetching { generation, .. }
            | RoleState::Resolved { generation, .. }
            | RoleState::Failed { generation, .. } => *generation,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, RoleState::Fetching { .. })
    }

    /// Resolution finished (either way) for exactly this identity
    pub fn is_settled_for(&self, identity: Identity) -> bool {
        match self {
            RoleState::Resolved { identity: id, .. } | RoleState::Failed { identity: id, .. } => {
                *id == identity
            }
            _ => false,
        }
    }

    /// Roles held, if resolution succeeded
    pub fn roles(&self) -> Option<&RoleSet> {
        match self {
            RoleState::Resolved { roles, .. } => Some(roles),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> RoleSnapshot {
        RoleSnapshot {
            identity: self.identity(),
            roles: self.roles().cloned().unwrap_or_default(),
            loading: self.is_loading(),
        }
    }
}

/// `{roles, loading}` view of a role state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSnapshot {
    pub identity: Option<Identity>,
    pub roles: RoleSet,
    pub loading: bool,
}

struct ResolverInner {
    store: Arc<dyn RoleStore>,
    state: watch::Sender<RoleState>,
    next_generation: AtomicU64,
    closed: watch::Sender<bool>,
    operation_timeout: Duration,
}

/// Resolves and tracks the roles of the current identity.
///
/// Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct RoleResolver {
    inner: Arc<ResolverInner>,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn RoleStore>, operation_timeout: Duration) -> Self {
        let (state, _) = watch::channel(RoleState::Idle);
        let (closed, _) = watch::channel(false);

        Self {
            inner: Arc::new(ResolverInner {
                store,
                state,
                next_generation: AtomicU64::new(0),
                closed,
                operation_timeout,
            }),
        }
    }

    pub fn state(&self) -> RoleState {
        self.inner.state.borrow().clone()
    }

    pub fn snapshot(&self) -> RoleSnapshot {
        self.inner.state.borrow().snapshot()
    }

    /// Get a receiver for role state changes
    pub fn subscribe(&self) -> watch::Receiver<RoleState> {
        self.inner.state.subscribe()
    }

    /// Point the resolver at a new identity.
    ///
    /// `None` clears the roles. A different identity starts a fetch; the
    /// identity already being tracked is a no-op.
    pub fn set_identity(&self, identity: Option<Identity>) {
        if self.is_closed() {
            return;
        }

        match identity {
            None => {
                self.inner.state.send_if_modified(|state| {
                    if *state == RoleState::Idle {
                        return false;
                    }
                    *state = RoleState::Idle;
                    true
                });
            }
            Some(identity) => {
                if self.inner.state.borrow().identity() == Some(identity) {
                    return;
                }
                self.start_fetch(identity);
            }
        }
    }

    /// Refetch roles for the tracked identity
    pub fn refresh(&self) {
        if self.is_closed() {
            return;
        }
        let identity = self.inner.state.borrow().identity();
        if let Some(identity) = identity {
            self.start_fetch(identity);
        }
    }

    /// Wait until no fetch is in flight
    pub async fn settled(&self) -> RoleSnapshot {
        let mut rx = self.subscribe();
        let snapshot = match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.snapshot(),
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    /// Wait until roles have settled for `identity`.
    ///
    /// Returns the current snapshot if the resolver shuts down first.
    pub async fn settled_for(&self, identity: Identity) -> RoleSnapshot {
        let mut rx = self.subscribe();
        let mut closed = self.inner.closed.subscribe();
        tokio::select! {
            settled = rx.wait_for(|state| state.is_settled_for(identity)) => match settled {
                Ok(state) => state.snapshot(),
                Err(_) => self.snapshot(),
            },
            _ = closed.wait_for(|closed| *closed) => self.snapshot(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.inner
            .state
            .borrow()
            .roles()
            .is_some_and(|roles| roles.has_role(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_developer(&self) -> bool {
        self.has_role(Role::Developer)
    }

    pub fn is_moderator(&self) -> bool {
        self.has_role(Role::Moderator)
    }

    pub fn can_access_console(&self) -> bool {
        self.is_developer() || self.is_admin()
    }

    /// Track a session: every settled session value is fed to `set_identity`.
    ///
    /// The task ends when the session provider goes away or on `shutdown`.
    pub fn follow_session(&self, mut session: watch::Receiver<SessionState>) -> JoinHandle<()> {
        let resolver = self.clone();
        let mut closed = self.inner.closed.subscribe();

        tokio::spawn(async move {
            loop {
                let state = *session.borrow_and_update();
                if let SessionState::Resolved(identity) = state {
                    resolver.set_identity(identity);
                }

                tokio::select! {
                    changed = session.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = closed.wait_for(|closed| *closed) => break,
                }
            }
            debug!("Stopped following session");
        })
    }

    /// Stop applying results. In-flight fetches are discarded on arrival.
    pub fn shutdown(&self) {
        self.inner.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Receiver that flips to `true` on `shutdown`
    pub fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.inner.closed.subscribe()
    }

    fn start_fetch(&self, identity: Identity) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_replace(RoleState::Fetching {
            identity,
            generation,
        });
        debug!(identity = %identity, generation, "Fetching roles");

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.fetch(identity, generation).await;
        });
    }
}

impl ResolverInner {
    async fn fetch(&self, identity: Identity, generation: u64) {
        let next = match timeout(self.operation_timeout, self.store.list_roles(&identity)).await {
            Ok(Ok(rows)) => RoleState::Resolved {
                identity,
                generation,
                roles: RoleSet::from_rows(&rows),
            },
            Ok(Err(e)) => {
                warn!(identity = %identity, error = %e, "Failed to fetch roles");
                RoleState::Failed {
                    identity,
                    generation,
                }
            }
            Err(_) => {
                warn!(identity = %identity, "Role fetch timed out");
                RoleState::Failed {
                    identity,
                    generation,
                }
            }
        };

        let closed = *self.closed.borrow();
        let applied = self.state.send_if_modified(|state| {
            let current = matches!(
                state,
                RoleState::Fetching { generation: g, .. } if *g == generation
            );
            if closed || !current {
                return false;
            }
            *state = next;
            true
        });

        if !applied {
            debug!(identity = %identity, generation, "Discarded stale role fetch");
        }
    }
}
