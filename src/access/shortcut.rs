//! Keyboard shortcut for the developer console

use crate::access::resolver::RoleResolver;
use crate::ui::{Navigator, Route};
use std::sync::Arc;
use tracing::debug;

/// A key press with its modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyPress {
    pub key: char,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
}

impl KeyPress {
    pub fn new(key: char) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// Ctrl/Cmd + D opens the developer console.
///
/// Reads the already-resolved predicate; the console route is gated again
/// on arrival.
pub struct ConsoleShortcut {
    resolver: RoleResolver,
    navigator: Arc<dyn Navigator>,
}

impl ConsoleShortcut {
    pub fn new(resolver: RoleResolver, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            resolver,
            navigator,
        }
    }

    /// Handle a key press; returns true if it navigated
    pub fn handle(&self, key: KeyPress) -> bool {
        if !(key.ctrl || key.meta) || !key.key.eq_ignore_ascii_case(&'d') {
            return false;
        }
        if !self.resolver.can_access_console() {
            debug!("Console shortcut ignored, no console access");
            return false;
        }
        self.navigator.navigate(Route::DevConsole);
        true
    }
}
