//! Easel - client core for a social artwork-sharing platform
//!
//! A thin client over a hosted data platform: users upload images, browse a
//! feed, comment, favorite and follow. The interesting part is authorization
//! state: the session identity and its roles arrive asynchronously and gate
//! protected views, and every mutation is applied optimistically with a
//! matching rollback.

pub mod access;
pub mod actions;
pub mod auth;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod feed;
pub mod models;
pub mod session;
pub mod storage;
pub mod ui;

pub use access::{AccessGate, Decision, Requirement, RoleResolver, RoleState};
pub use auth::{Identity, Role, RoleSet};
pub use client::Easel;
pub use config::EaselConfig;
pub use error::{EaselError, Result};
pub use session::{SessionProvider, SessionState};
