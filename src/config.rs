//! Client configuration

use crate::storage::PostgresConfig;
use std::time::Duration;

/// Default public URL prefix for uploaded objects
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:54321";

/// Default maximum comment length, in characters
pub const DEFAULT_MAX_COMMENT_LEN: usize = 1000;

/// Configuration for an Easel client
#[derive(Debug, Clone)]
pub struct EaselConfig {
    /// Platform database (absent when running against an in-memory backend)
    pub database: Option<PostgresConfig>,

    /// Session token identifying the signed-in user
    pub session_token: Option<String>,

    /// Public base URL for stored objects
    pub public_url: String,

    /// Timeout for remote reads (identity and role lookups)
    pub operation_timeout: Duration,

    /// Maximum comment length
    pub max_comment_len: usize,

    /// Bucket for artwork images
    pub artwork_bucket: String,

    /// Bucket for profile avatars
    pub avatar_bucket: String,
}

impl Default for EaselConfig {
    fn default() -> Self {
        Self {
            database: None,
            session_token: None,
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            operation_timeout: Duration::from_secs(10),
            max_comment_len: DEFAULT_MAX_COMMENT_LEN,
            artwork_bucket: "artworks".to_string(),
            avatar_bucket: "avatars".to_string(),
        }
    }
}

impl EaselConfig {
    /// Create a configuration for the given database
    pub fn new(database: PostgresConfig) -> Self {
        Self {
            database: Some(database),
            ..Self::default()
        }
    }

    /// Build from `DATABASE_URL`/`PG*`, `EASEL_SESSION_TOKEN` and `EASEL_PUBLIC_URL`
    pub fn from_env() -> Self {
        let mut config = Self {
            database: PostgresConfig::from_env().ok(),
            session_token: std::env::var("EASEL_SESSION_TOKEN").ok(),
            ..Self::default()
        };
        if let Ok(url) = std::env::var("EASEL_PUBLIC_URL") {
            config.public_url = url;
        }
        config
    }

    /// Set the session token
    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Set the public object URL prefix
    pub fn public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }

    /// Set the operation timeout
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the maximum comment length
    pub fn max_comment_len(mut self, len: usize) -> Self {
        self.max_comment_len = len;
        self
    }
}
