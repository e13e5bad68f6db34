//! Role assignments

use crate::auth::identity::Identity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Roles that can be assigned to an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular member
    User,
    /// Access to the developer console
    Developer,
    /// Content moderation
    Moderator,
    /// Full administrative access
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Developer, Role::Moderator, Role::Admin];

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Role::User),
            "developer" => Some(Role::Developer),
            "moderator" => Some(Role::Moderator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Developer => "developer",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw `user_roles` row as returned by the data API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRow {
    pub user_id: Identity,
    pub role: String,
}

impl RoleRow {
    pub fn new(user_id: Identity, role: Role) -> Self {
        Self {
            user_id,
            role: role.to_string(),
        }
    }
}

/// The set of roles held by one identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    roles: BTreeSet<Role>,
}

impl RoleSet {
    pub fn new() -> Self {
        Self {
            roles: BTreeSet::new(),
        }
    }

    /// Map raw rows into a role set. Unknown role names are skipped.
    pub fn from_rows(rows: &[RoleRow]) -> Self {
        let mut set = RoleSet::new();
        for row in rows {
            match Role::parse(&row.role) {
                Some(role) => set.add(role),
                None => warn!(user_id = %row.user_id, role = %row.role, "Ignoring unknown role"),
            }
        }
        set
    }

    pub fn add(&mut self, role: Role) {
        self.roles.insert(role);
    }

    pub fn remove(&mut self, role: Role) {
        self.roles.remove(&role);
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Check if any of the given roles is held
    pub fn has_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
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

    /// Developer console access
    pub fn can_access_console(&self) -> bool {
        self.is_developer() || self.is_admin()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        RoleSet {
            roles: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.roles.is_empty() {
            return f.write_str("(none)");
        }
        let names: Vec<&str> = self.roles.iter().map(Role::as_str).collect();
        f.write_str(&names.join(", "))
    }
}
