//! Principal identities
//!
//! An identity is the opaque id the auth subsystem hands out at sign-in.
//! The client never inspects it beyond equality and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("invalid identity: '{0}'")]
    InvalidFormat(String),
}

/// An authenticated principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Uuid);

impl Identity {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh identity (used by in-memory backends and tests)
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identity from its string form
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| IdentityError::InvalidFormat(s.to_string()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Identity {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
