//! Identities and roles
//!
//! Roles form a closed set:
//! - `user`: regular member
//! - `developer`: developer console access
//! - `moderator`: content moderation
//! - `admin`: everything, including the console
//!
//! Role checks in this crate only decide what is shown. The backend's
//! row-level policies decide what is permitted.

mod identity;
mod roles;

pub use identity::{Identity, IdentityError};
pub use roles::{Role, RoleRow, RoleSet};
