//! Access gate for protected views
//!
//! `evaluate` is the pure decision. `AccessGate` adds the side effects
//! (redirects and the denial notification) and makes sure each denial fires
//! once per session/role-resolution cycle, not on every re-evaluation.

use crate::access::resolver::RoleState;
use crate::auth::{Identity, Role};
use crate::session::SessionState;
use crate::ui::{Navigator, Notification, Notifier, Route};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// What a protected view requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any signed-in identity
    Authenticated,
    /// Signed in and holding at least one of these roles
    AnyRole(Vec<Role>),
}

impl Requirement {
    /// The developer console requirement
    pub fn console() -> Self {
        Requirement::AnyRole(vec![Role::Developer, Role::Admin])
    }
}

/// Render outcome of a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Still resolving; render nothing, navigate nowhere
    Pending,
    /// Signed out; redirect to sign-in
    SignInRequired,
    /// Signed in but missing every required role
    InsufficientPrivilege,
    /// Render the protected view
    Granted,
}

/// Decide from the current session and role state.
///
/// Role requirements stay `Pending` until the role state has settled for
/// exactly the session's identity, so a user whose roles have not arrived yet
/// is never denied.
pub fn evaluate(session: &SessionState, roles: &RoleState, requirement: &Requirement) -> Decision {
    let identity = match session {
        SessionState::Resolving => return Decision::Pending,
        SessionState::Resolved(None) => return Decision::SignInRequired,
        SessionState::Resolved(Some(identity)) => *identity,
    };

    match requirement {
        Requirement::Authenticated => Decision::Granted,
        Requirement::AnyRole(required) => {
            if !roles.is_settled_for(identity) {
                return Decision::Pending;
            }
            let held = roles.roles().is_some_and(|set| set.has_any(required));
            if held {
                Decision::Granted
            } else {
                Decision::InsufficientPrivilege
            }
        }
    }
}

/// Identifies one denial so it fires only once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DenialKey {
    decision: Decision,
    identity: Option<Identity>,
    generation: u64,
}

/// Stateful gate that performs redirect/notification side effects
pub struct AccessGate {
    requirement: Requirement,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    fallback: Route,
    decision: Decision,
    last_denial: Option<DenialKey>,
}

impl AccessGate {
    pub fn new(
        requirement: Requirement,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            requirement,
            navigator,
            notifier,
            fallback: Route::Home,
            decision: Decision::Pending,
            last_denial: None,
        }
    }

    /// Where insufficient-privilege denials navigate to (default: home)
    pub fn fallback(mut self, route: Route) -> Self {
        self.fallback = route;
        self
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Last decision
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// Re-evaluate against new inputs and run side effects on denial
    /// transitions.
    pub fn update(&mut self, session: &SessionState, roles: &RoleState) -> Decision {
        let decision = evaluate(session, roles, &self.requirement);
        if decision != self.decision {
            debug!(from = ?self.decision, to = ?decision, "Gate decision changed");
        }
        self.decision = decision;

        match decision {
            Decision::SignInRequired | Decision::InsufficientPrivilege => {
                let key = DenialKey {
                    decision,
                    identity: session.identity(),
                    generation: match decision {
                        Decision::InsufficientPrivilege => roles.generation(),
                        _ => 0,
                    },
                };
                if self.last_denial != Some(key) {
                    self.last_denial = Some(key);
                    self.deny(decision);
                }
            }
            Decision::Granted => self.last_denial = None,
            Decision::Pending => {}
        }

        decision
    }

    fn deny(&self, decision: Decision) {
        match decision {
            Decision::SignInRequired => {
                info!("Not signed in, redirecting to sign-in");
                self.navigator.navigate(Route::SignIn);
            }
            Decision::InsufficientPrivilege => {
                let needed = match &self.requirement {
                    Requirement::AnyRole(roles) => roles
                        .iter()
                        .map(Role::as_str)
                        .collect::<Vec<_>>()
                        .join(" or "),
                    Requirement::Authenticated => "an account".to_string(),
                };
                info!(needed = %needed, "Insufficient privilege, redirecting");
                self.notifier.notify(Notification::error(
                    "Access denied",
                    format!("This page requires {} access", needed),
                ));
                self.navigator.navigate(self.fallback);
            }
            Decision::Pending | Decision::Granted => {}
        }
    }

    /// Drive the gate from live session and role receivers.
    ///
    /// The returned handle publishes each decision; dropping it tears the
    /// gate down.
    pub fn watch(
        mut self,
        mut session: watch::Receiver<SessionState>,
        mut roles: watch::Receiver<RoleState>,
    ) -> GateHandle {
        let (tx, rx) = watch::channel(Decision::Pending);

        let task = tokio::spawn(async move {
            loop {
                let session_state = *session.borrow_and_update();
                let role_state = roles.borrow_and_update().clone();
                let decision = self.update(&session_state, &role_state);

                tx.send_if_modified(|current| {
                    if *current == decision {
                        return false;
                    }
                    *current = decision;
                    true
                });

                tokio::select! {
                    changed = session.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = roles.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        GateHandle {
            decision: rx,
            task,
        }
    }
}

/// A running gate
pub struct GateHandle {
    decision: watch::Receiver<Decision>,
    task: JoinHandle<()>,
}

impl GateHandle {
    pub fn decision(&self) -> Decision {
        *self.decision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Decision> {
        self.decision.clone()
    }

    /// Wait for the first non-pending decision
    pub async fn decided(&self) -> Decision {
        let mut rx = self.decision.clone();
        let decision = match rx.wait_for(|d| *d != Decision::Pending).await {
            Ok(decision) => *decision,
            // The gate task ended without deciding
            Err(_) => Decision::Pending,
        };
        decision
    }

    /// Like `decided`, but gives up with `Pending` once `closed` flips to true
    pub async fn decided_until(&self, mut closed: watch::Receiver<bool>) -> Decision {
        tokio::select! {
            decision = self.decided() => decision,
            _ = closed.wait_for(|closed| *closed) => Decision::Pending,
        }
    }

    /// Stop the gate
    pub fn teardown(self) {}
}

impl Drop for GateHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
