//! Backend bindings for Easel
//!
//! - Postgres: the platform database, accessed as JSON rows
//! - Memory: in-process tables with the same constraints, for tests and demos
//!
//! The traits mirror the platform's auto-generated data API: a handful of
//! table operations keyed by equality filters, plus auth, roles and objects.

mod memory;
mod postgres;

pub use memory::{MemoryStore, RoleFetchHold};
pub use postgres::{ConfigError, PostgresConfig, PostgresStore, SslMode};

use crate::auth::{Identity, Role, RoleRow};
pub use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("duplicate row in {table}: {key}")]
    Conflict { table: String, key: String },

    #[error("unknown column '{column}' for table {table}")]
    InvalidColumn { table: String, column: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Tables exposed by the data API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Artworks,
    Profiles,
    Comments,
    Favorites,
    Follows,
    Tags,
    ArtworkTags,
    UserRoles,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Artworks => "artworks",
            Table::Profiles => "profiles",
            Table::Comments => "comments",
            Table::Favorites => "favorites",
            Table::Follows => "follows",
            Table::Tags => "tags",
            Table::ArtworkTags => "artwork_tags",
            Table::UserRoles => "user_roles",
        }
    }

    /// Columns clients may read, write or filter on
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Artworks => &[
                "id",
                "user_id",
                "title",
                "description",
                "image_url",
                "view_count",
                "created_at",
            ],
            Table::Profiles => &[
                "id",
                "username",
                "display_name",
                "bio",
                "avatar_url",
                "created_at",
            ],
            Table::Comments => &["id", "artwork_id", "user_id", "content", "created_at"],
            Table::Favorites => &["user_id", "artwork_id", "created_at"],
            Table::Follows => &["follower_id", "following_id", "created_at"],
            Table::Tags => &["id", "name"],
            Table::ArtworkTags => &["artwork_id", "tag_id"],
            Table::UserRoles => &["user_id", "role"],
        }
    }

    /// Column sets the store keeps unique
    pub fn unique_keys(&self) -> &'static [&'static [&'static str]] {
        match self {
            Table::Artworks | Table::Comments => &[&["id"]],
            Table::Profiles => &[&["id"], &["username"]],
            Table::Favorites => &[&["user_id", "artwork_id"]],
            Table::Follows => &[&["follower_id", "following_id"]],
            Table::Tags => &[&["id"], &["name"]],
            Table::ArtworkTags => &[&["artwork_id", "tag_id"]],
            Table::UserRoles => &[&["user_id", "role"]],
        }
    }

    /// Whether the store generates a uuid `id` on insert
    pub fn has_generated_id(&self) -> bool {
        matches!(self, Table::Artworks | Table::Comments | Table::Tags)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    /// Reject any column name not in the table's whitelist
    pub fn check_columns<'a>(
        &self,
        columns: impl IntoIterator<Item = &'a String>,
    ) -> Result<(), StorageError> {
        for column in columns {
            if !self.has_column(column) {
                return Err(StorageError::InvalidColumn {
                    table: self.name().to_string(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Equality predicates, all of which must hold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: Map<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    pub fn eq(mut self, column: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(column.to_string(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// The filter as a JSON object (for containment queries)
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.fields
            .iter()
            .all(|(column, expected)| row.get(column) == Some(expected))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// A select: filter, optional ordering and limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn eq(mut self, column: &str, value: impl Serialize) -> Self {
        self.filter = self.filter.eq(column, value);
        self
    }

    pub fn order_by(mut self, column: &str, descending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Trait for the auth subsystem
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Identity of the current session, if signed in
    async fn current_identity(&self) -> Result<Option<Identity>, StorageError>;
}

/// Trait for role assignment storage
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// All role rows stored for an identity
    async fn list_roles(&self, identity: &Identity) -> Result<Vec<RoleRow>, StorageError>;

    /// Assign a role (no-op if already held)
    async fn assign_role(&self, identity: &Identity, role: Role) -> Result<(), StorageError>;

    /// Revoke a role
    async fn revoke_role(&self, identity: &Identity, role: Role) -> Result<(), StorageError>;
}

/// Trait for table access
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StorageError>;

    /// Insert a row, returns the stored row
    async fn insert(&self, table: Table, row: Value) -> Result<Value, StorageError>;

    /// Insert a row, or return the existing one on conflict of `conflict_column`
    async fn upsert(
        &self,
        table: Table,
        row: Value,
        conflict_column: &str,
    ) -> Result<Value, StorageError>;

    /// Update matching rows, returns the number updated
    async fn update(&self, table: Table, filter: &Filter, patch: Value)
        -> Result<u64, StorageError>;

    /// Delete matching rows, returns the number deleted
    async fn delete(&self, table: Table, filter: &Filter) -> Result<u64, StorageError>;

    async fn count(&self, table: Table, filter: &Filter) -> Result<u64, StorageError>;

    /// Atomic server-side increment of an artwork's view count
    async fn increment_view_count(&self, artwork_id: Uuid) -> Result<(), StorageError>;
}

/// Trait for object (file) storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under bucket/key, returns the public URL
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError>;
}

/// Everything the client needs from the platform
pub trait Backend: AuthStore + RoleStore + DataStore + ObjectStore {}

impl<T: AuthStore + RoleStore + DataStore + ObjectStore> Backend for T {}

/// Decode a single row
pub fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T, StorageError> {
    serde_json::from_value(row).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Decode a list of rows
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StorageError> {
    rows.into_iter().map(decode_row).collect()
}

/// Object keys of a row, or an error if it is not an object
pub(crate) fn row_object(table: Table, row: &Value) -> Result<&Map<String, Value>, StorageError> {
    let object = row
        .as_object()
        .ok_or_else(|| StorageError::Serialization(format!("{} row is not an object", table)))?;
    table.check_columns(object.keys())?;
    Ok(object)
}
