//! Easel client
//!
//! Wires the session provider, role resolver, actions and views to one
//! backend. Cheaply cloneable.

use crate::access::{
    AccessGate, ConsoleShortcut, Decision, GateHandle, Requirement, RoleResolver,
};
use crate::actions::Actions;
use crate::auth::Identity;
use crate::config::EaselConfig;
use crate::console::DevConsole;
use crate::error::{EaselError, Result};
use crate::feed::{ArtworkDetail, Views};
use crate::session::SessionProvider;
use crate::storage::{Backend, DataStore, RoleStore};
use crate::ui::{Navigator, Notifier, Route};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

struct ClientInner {
    config: EaselConfig,
    session: SessionProvider,
    roles: RoleResolver,
    actions: Actions,
    views: Views,
    data: Arc<dyn DataStore>,
    role_store: Arc<dyn RoleStore>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    follow_task: Mutex<Option<JoinHandle<()>>>,
}

/// The application context
#[derive(Clone)]
pub struct Easel {
    inner: Arc<ClientInner>,
}

impl Easel {
    pub fn new<B: Backend + 'static>(
        backend: Arc<B>,
        config: EaselConfig,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let timeout = config.operation_timeout;
        let data: Arc<dyn DataStore> = backend.clone();
        let role_store: Arc<dyn RoleStore> = backend.clone();

        let inner = ClientInner {
            session: SessionProvider::new(backend.clone(), timeout),
            roles: RoleResolver::new(role_store.clone(), timeout),
            actions: Actions::new(data.clone(), backend, notifier.clone(), &config),
            views: Views::new(data.clone()),
            config,
            data,
            role_store,
            navigator,
            notifier,
            follow_task: Mutex::new(None),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Start following the session and load it.
    ///
    /// Returns the identity the session resolved to.
    pub async fn start(&self) -> Option<Identity> {
        {
            let mut task = self.inner.follow_task.lock();
            if task.is_none() {
                let session = self.inner.session.subscribe();
                *task = Some(self.inner.roles.follow_session(session));
            }
        }
        let identity = self.inner.session.load().await;
        info!(identity = ?identity, "Easel started");
        identity
    }

    pub fn config(&self) -> &EaselConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionProvider {
        &self.inner.session
    }

    pub fn roles(&self) -> &RoleResolver {
        &self.inner.roles
    }

    pub fn actions(&self) -> &Actions {
        &self.inner.actions
    }

    pub fn views(&self) -> &Views {
        &self.inner.views
    }

    /// The signed-in identity, or `NotSignedIn`
    pub fn require_identity(&self) -> Result<Identity> {
        self.inner.session.identity().ok_or(EaselError::NotSignedIn)
    }

    /// A live gate for `requirement` over this client's session and roles
    pub fn gate(&self, requirement: Requirement) -> GateHandle {
        self.gate_with_fallback(requirement, Route::Home)
    }

    pub fn gate_with_fallback(&self, requirement: Requirement, fallback: Route) -> GateHandle {
        AccessGate::new(
            requirement,
            self.inner.navigator.clone(),
            self.inner.notifier.clone(),
        )
        .fallback(fallback)
        .watch(self.inner.session.subscribe(), self.inner.roles.subscribe())
    }

    /// Open the developer console once the console gate grants access.
    ///
    /// The wait covers a session lookup and a role fetch, each bounded by the
    /// operation timeout. A session that never resolves (the client was not
    /// started) ends in `Timeout`.
    pub async fn open_console(&self) -> Result<DevConsole> {
        if self.inner.roles.is_closed() {
            return Err(EaselError::Shutdown);
        }

        let gate = self.gate(Requirement::console());
        let wait = self.inner.config.operation_timeout * 2;
        let closed = self.inner.roles.subscribe_closed();
        let decided = timeout(wait, gate.decided_until(closed)).await;
        gate.teardown();
        let decision = decided.map_err(|_| EaselError::Timeout)?;

        match decision {
            Decision::Granted => {
                debug!("Console opened");
                Ok(DevConsole::new(
                    self.inner.data.clone(),
                    self.inner.role_store.clone(),
                ))
            }
            Decision::SignInRequired => Err(EaselError::NotSignedIn),
            Decision::InsufficientPrivilege => Err(EaselError::AccessDenied(
                "developer console requires developer or admin role".to_string(),
            )),
            Decision::Pending => Err(EaselError::Shutdown),
        }
    }

    /// Ctrl/Cmd+D handler bound to this client
    pub fn console_shortcut(&self) -> ConsoleShortcut {
        ConsoleShortcut::new(self.inner.roles.clone(), self.inner.navigator.clone())
    }

    /// Load the artwork page and record the view
    pub async fn open_artwork(&self, id: Uuid) -> Option<ArtworkDetail> {
        let detail = self
            .inner
            .views
            .artwork(id, self.inner.session.identity())
            .await?;
        self.inner.actions.record_view(id).await;
        Some(detail)
    }

    /// Stop background work. Pending role fetches are discarded.
    pub fn shutdown(&self) {
        self.inner.roles.shutdown();
        if let Some(task) = self.inner.follow_task.lock().take() {
            task.abort();
        }
        debug!("Easel shut down");
    }
}
