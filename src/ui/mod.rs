//! Routes and user-visible side effects
//!
//! Navigation and transient notifications are the only effects the access
//! layer and the actions produce. Hosts plug in their own `Navigator` and
//! `Notifier`; `EventLog` records both for the CLI and tests.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;

/// Client routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    SignIn,
    AccessDenied,
    DevConsole,
    Upload,
    Artwork(Uuid),
    Profile(Identity),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::SignIn => "/auth".to_string(),
            Route::AccessDenied => "/access-denied".to_string(),
            Route::DevConsole => "/dev".to_string(),
            Route::Upload => "/upload".to_string(),
            Route::Artwork(id) => format!("/artwork/{}", id),
            Route::Profile(id) => format!("/profile/{}", id),
        }
    }

    /// Parse a path; unknown paths yield `None`
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');

        match trimmed {
            "" => return Some(Route::Home),
            "/auth" => return Some(Route::SignIn),
            "/access-denied" => return Some(Route::AccessDenied),
            "/dev" => return Some(Route::DevConsole),
            "/upload" => return Some(Route::Upload),
            _ => {}
        }

        if let Some(id) = trimmed.strip_prefix("/artwork/") {
            return Uuid::parse_str(id).ok().map(Route::Artwork);
        }
        if let Some(id) = trimmed.strip_prefix("/profile/") {
            return Identity::parse(id).ok().map(Route::Profile);
        }
        None
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A transient message shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    /// Set for field-level validation messages
    pub field: Option<String>,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            message: message.into(),
            field: None,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.into(),
            field: None,
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: "Invalid input".to_string(),
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} ({}): {}", self.title, field, self.message),
            None => write!(f, "{}: {}", self.title, self.message),
        }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// A recorded side effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Navigated(Route),
    Notified(Notification),
}

/// Records every navigation and notification in order
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<UiEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }

    pub fn navigations(&self) -> Vec<Route> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                UiEvent::Navigated(route) => Some(*route),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                UiEvent::Notified(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    /// Remove and return everything recorded so far
    pub fn drain(&self) -> Vec<UiEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl Navigator for EventLog {
    fn navigate(&self, route: Route) {
        self.events.lock().push(UiEvent::Navigated(route));
    }
}

impl Notifier for EventLog {
    fn notify(&self, notification: Notification) {
        self.events.lock().push(UiEvent::Notified(notification));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths_roundtrip() {
        let artwork = Uuid::new_v4();
        let user = Identity::generate();
        for route in [
            Route::Home,
            Route::SignIn,
            Route::AccessDenied,
            Route::DevConsole,
            Route::Upload,
            Route::Artwork(artwork),
            Route::Profile(user),
        ] {
            assert_eq!(Route::parse(&route.path()), Some(route));
        }
    }

    #[test]
    fn test_route_parse_edge_cases() {
        assert_eq!(Route::parse("/dev/"), Some(Route::DevConsole));
        assert_eq!(Route::parse("/auth?next=/dev"), Some(Route::SignIn));
        assert_eq!(Route::parse("/artwork/not-a-uuid"), None);
        assert_eq!(Route::parse("/settings"), None);
    }

    #[test]
    fn test_notification_display() {
        let n = Notification::field("content", "Comment cannot be empty");
        assert_eq!(n.to_string(), "Invalid input (content): Comment cannot be empty");

        let n = Notification::error("Access denied", "Developer access required");
        assert_eq!(n.to_string(), "Access denied: Developer access required");
    }

    #[test]
    fn test_event_log_records_in_order() {
        let log = EventLog::new();
        log.notify(Notification::info("Saved", "ok"));
        log.navigate(Route::Home);

        assert_eq!(log.events().len(), 2);
        assert_eq!(log.navigations(), vec![Route::Home]);
        assert_eq!(log.notifications().len(), 1);

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(log.events().is_empty());
    }
}
