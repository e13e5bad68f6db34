//! Role resolution and access gating
//!
//! Session -> `RoleResolver` -> `AccessGate` -> protected view. The gate
//! only affects what is shown; the backend's policies are the authority.

mod gate;
mod resolver;
mod shortcut;

pub use gate::{evaluate, AccessGate, Decision, GateHandle, Requirement};
pub use resolver::{RoleResolver, RoleSnapshot, RoleState};
pub use shortcut::{ConsoleShortcut, KeyPress};
