//! In-memory backend
//!
//! Keeps every table as a list of JSON rows and enforces the same uniqueness
//! constraints as the platform schema. Failure injection (offline mode,
//! failing rows) and role-fetch holds make the async races reproducible.

use crate::auth::{Identity, Role, RoleRow};
use crate::storage::{
    async_trait, decode_rows, row_object, AuthStore, DataStore, Filter, ObjectStore, Query,
    RoleStore, StorageError, Table,
};
use chrono::{SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

/// Holds the next role fetch for one identity until released
#[derive(Debug, Clone)]
pub struct RoleFetchHold {
    notify: Arc<Notify>,
}

impl RoleFetchHold {
    /// Let the held fetch complete
    pub fn release(&self) {
        self.notify.notify_one();
    }
}

/// In-process implementation of every backend trait
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<Value>>>,
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    public_url: String,
    current: RwLock<Option<Identity>>,
    offline: AtomicBool,
    failing: RwLock<Vec<(Table, Filter)>>,
    role_holds: Mutex<HashMap<Identity, Arc<Notify>>>,
    role_fetches: AtomicU64,
    writes: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_public_url("memory://storage")
    }

    pub fn with_public_url(public_url: impl Into<String>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            current: RwLock::new(None),
            offline: AtomicBool::new(false),
            failing: RwLock::new(Vec::new()),
            role_holds: Mutex::new(HashMap::new()),
            role_fetches: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Set the identity reported by `current_identity`
    pub fn set_current_identity(&self, identity: Option<Identity>) {
        *self.current.write() = identity;
    }

    /// Make every call fail as if the network were down
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make writes of rows matching `filter` in `table` fail
    pub fn fail_writes_matching(&self, table: Table, filter: Filter) {
        self.failing.write().push((table, filter));
    }

    /// Hold the next role fetch for `identity` until the hold is released
    pub fn hold_roles(&self, identity: Identity) -> RoleFetchHold {
        let notify = Arc::new(Notify::new());
        self.role_holds.lock().insert(identity, notify.clone());
        RoleFetchHold { notify }
    }

    /// Number of role fetches issued so far
    pub fn role_fetch_count(&self) -> u64 {
        self.role_fetches.load(Ordering::SeqCst)
    }

    /// Number of write calls issued so far (including failed ones)
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Insert a row directly, bypassing failure injection and counters
    pub fn seed(&self, table: Table, row: Value) -> Result<Value, StorageError> {
        self.insert_row(table, row)
    }

    /// Assign roles directly
    pub fn seed_roles(&self, identity: Identity, roles: &[Role]) {
        for role in roles {
            let _ = self.insert_row(Table::UserRoles, json!(RoleRow::new(identity, *role)));
        }
    }

    /// Snapshot of a table
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.tables.read().get(&table).cloned().unwrap_or_default()
    }

    /// Stored object bytes
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("network unreachable".to_string()));
        }
        Ok(())
    }

    fn begin_write(&self, table: Table, row: &Value) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let failing = self.failing.read();
        if failing
            .iter()
            .any(|(t, filter)| *t == table && filter.matches(row))
        {
            return Err(StorageError::Database(format!("write rejected on {}", table)));
        }
        Ok(())
    }

    fn insert_row(&self, table: Table, row: Value) -> Result<Value, StorageError> {
        let mut object = row_object(table, &row)?.clone();

        if table.has_generated_id() && !object.contains_key("id") {
            object.insert("id".to_string(), json!(Uuid::new_v4()));
        }
        if table.has_column("created_at") && !object.contains_key("created_at") {
            object.insert("created_at".to_string(), json!(timestamp()));
        }
        if table == Table::Artworks && !object.contains_key("view_count") {
            object.insert("view_count".to_string(), json!(0));
        }

        let row = Value::Object(object);
        let mut tables = self.tables.write();
        let rows = tables.entry(table).or_default();

        check_unique(table, rows.iter(), &row)?;
        rows.push(row.clone());
        Ok(row)
    }
}

/// Fail with `Conflict` if any of `others` shares a unique key with `row`
fn check_unique<'a>(
    table: Table,
    others: impl Iterator<Item = &'a Value>,
    row: &Value,
) -> Result<(), StorageError> {
    let others: Vec<&Value> = others.collect();
    for key in table.unique_keys() {
        if let Some(existing) = others.iter().find(|r| same_key(r, row, key)) {
            let key_desc = key
                .iter()
                .map(|c| format!("{}={}", c, existing.get(*c).unwrap_or(&Value::Null)))
                .collect::<Vec<_>>()
                .join(",");
            return Err(StorageError::Conflict {
                table: table.name().to_string(),
                key: key_desc,
            });
        }
    }
    Ok(())
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Both rows carry every column of `key` with equal values
fn same_key(a: &Value, b: &Value, key: &[&str]) -> bool {
    key.iter().all(|column| match (a.get(*column), b.get(*column)) {
        (Some(x), Some(y)) => !x.is_null() && x == y,
        _ => false,
    })
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Null) | None, Some(Value::Null) | None) => CmpOrdering::Equal,
        (Some(Value::Null) | None, _) => CmpOrdering::Less,
        (_, Some(Value::Null) | None) => CmpOrdering::Greater,
        _ => CmpOrdering::Equal,
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn current_identity(&self) -> Result<Option<Identity>, StorageError> {
        self.check_online()?;
        Ok(*self.current.read())
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn list_roles(&self, identity: &Identity) -> Result<Vec<RoleRow>, StorageError> {
        self.role_fetches.fetch_add(1, Ordering::SeqCst);

        let hold = self.role_holds.lock().remove(identity);
        if let Some(notify) = hold {
            debug!(identity = %identity, "Role fetch held");
            notify.notified().await;
        }

        self.check_online()?;
        let rows = self.select(Table::UserRoles, &Query::new().eq("user_id", identity)).await?;
        decode_rows(rows)
    }

    async fn assign_role(&self, identity: &Identity, role: Role) -> Result<(), StorageError> {
        match self.insert(Table::UserRoles, json!(RoleRow::new(*identity, role))).await {
            Ok(_) | Err(StorageError::Conflict { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn revoke_role(&self, identity: &Identity, role: Role) -> Result<(), StorageError> {
        let filter = Filter::new().eq("user_id", identity).eq("role", role);
        self.delete(Table::UserRoles, &filter).await?;
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StorageError> {
        self.check_online()?;
        table.check_columns(query.filter.columns())?;

        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| query.filter.matches(row))
            .collect();

        if let Some(order) = &query.order {
            if !table.has_column(&order.column) {
                return Err(StorageError::InvalidColumn {
                    table: table.name().to_string(),
                    column: order.column.clone(),
                });
            }
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StorageError> {
        self.begin_write(table, &row)?;
        self.insert_row(table, row)
    }

    async fn upsert(
        &self,
        table: Table,
        row: Value,
        conflict_column: &str,
    ) -> Result<Value, StorageError> {
        self.begin_write(table, &row)?;
        row_object(table, &row)?;
        if !table.has_column(conflict_column) {
            return Err(StorageError::InvalidColumn {
                table: table.name().to_string(),
                column: conflict_column.to_string(),
            });
        }

        if let Some(value) = row.get(conflict_column) {
            let existing = self
                .rows(table)
                .into_iter()
                .find(|r| r.get(conflict_column) == Some(value));
            if let Some(existing) = existing {
                return Ok(existing);
            }
        }

        self.insert_row(table, row)
    }

    async fn update(
        &self,
        table: Table,
        filter: &Filter,
        patch: Value,
    ) -> Result<u64, StorageError> {
        self.begin_write(table, &filter.to_json())?;
        table.check_columns(filter.columns())?;
        let patch = row_object(table, &patch)?.clone();

        let mut tables = self.tables.write();
        let rows = tables.entry(table).or_default();

        let mut patched = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if !filter.matches(row) {
                continue;
            }
            let mut row = row.clone();
            if let Some(object) = row.as_object_mut() {
                for (column, value) in &patch {
                    object.insert(column.clone(), value.clone());
                }
                patched.push((index, row));
            }
        }

        // Nothing is written unless every patched row keeps its keys unique
        for (index, row) in &patched {
            let others = rows
                .iter()
                .enumerate()
                .filter(|(i, _)| i != index)
                .map(|(i, r)| {
                    patched
                        .iter()
                        .find(|(p, _)| *p == i)
                        .map_or(r, |(_, patched_row)| patched_row)
                });
            check_unique(table, others, row)?;
        }

        let updated = patched.len() as u64;
        for (index, row) in patched {
            rows[index] = row;
        }
        Ok(updated)
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<u64, StorageError> {
        self.begin_write(table, &filter.to_json())?;
        table.check_columns(filter.columns())?;

        let mut tables = self.tables.write();
        let rows = tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        Ok((before - rows.len()) as u64)
    }

    async fn count(&self, table: Table, filter: &Filter) -> Result<u64, StorageError> {
        let rows = self.select(table, &Query::new().filter(filter.clone())).await?;
        Ok(rows.len() as u64)
    }

    async fn increment_view_count(&self, artwork_id: Uuid) -> Result<(), StorageError> {
        self.begin_write(Table::Artworks, &json!({ "id": artwork_id }))?;

        let mut tables = self.tables.write();
        let id = json!(artwork_id);
        let artwork = tables
            .entry(Table::Artworks)
            .or_default()
            .iter_mut()
            .find(|row| row.get("id") == Some(&id))
            .ok_or_else(|| StorageError::NotFound(format!("Artwork not found: {}", artwork_id)))?;

        let views = artwork.get("view_count").and_then(Value::as_i64).unwrap_or(0);
        if let Some(object) = artwork.as_object_mut() {
            object.insert("view_count".to_string(), json!(views + 1));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(format!("{}/{}/{}", self.public_url, bucket, key))
    }
}
