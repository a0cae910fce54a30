//! Repository collaborator — pluggable keyed storage
//!
//! Generic create/read/update/delete by table and exact-match filter,
//! injected explicitly into each pipeline component (no global connector).
//! Two backends:
//! - `SledRepository`: durable, tree per table, atomic multi-row updates
//! - `MemoryRepository`: in-memory store for tests and `--memory` runs
//!
//! Records are stored as JSON objects keyed by their `id` field; components
//! own the typed view and convert at the boundary.

mod memory;
mod sled_store;

pub use memory::MemoryRepository;
pub use sled_store::SledRepository;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// Named tables the pipeline persists into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Studies,
    Tasks,
    Participants,
    Responses,
    Analyses,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Studies,
        Table::Tasks,
        Table::Participants,
        Table::Responses,
        Table::Analyses,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Studies => "studies",
            Table::Tasks => "tasks",
            Table::Participants => "participants",
            Table::Responses => "responses",
            Table::Analyses => "analyses",
        }
    }
}

/// Exact-match conjunction filter over record fields.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the primary key.
    pub fn by_id(id: Uuid) -> Self {
        Self::new().eq("id", id)
    }

    /// Add an `field == value` clause. Values are compared in their JSON
    /// representation (UUIDs as strings, enums as their wire names).
    pub fn eq(mut self, field: &str, value: impl serde::Serialize) -> Self {
        let v = serde_json::to_value(value).unwrap_or(Value::Null);
        self.clauses.push((field.to_string(), v));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether a record satisfies every clause.
    pub fn matches(&self, record: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

/// Repository failure modes.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("record is missing an 'id' field")]
    MissingId,
}

/// Keyed storage contract shared by all pipeline components.
///
/// Implementations must be thread-safe; every call is a suspension point
/// from the caller's perspective even when the backend is synchronous.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert a record. The record must carry a string `id` field.
    async fn create(&self, table: Table, record: Value) -> Result<Uuid, RepositoryError>;

    /// Read all records matching the filter (all records if empty).
    async fn read(&self, table: Table, filter: &Filter) -> Result<Vec<Value>, RepositoryError>;

    /// Shallow-merge `patch` into every matching record. Returns affected ids.
    async fn update(
        &self,
        table: Table,
        filter: &Filter,
        patch: Value,
    ) -> Result<Vec<Uuid>, RepositoryError>;

    /// Apply several patches in one atomic unit: either every patch lands or
    /// none does, and no concurrent read observes a partial application.
    async fn update_many(
        &self,
        table: Table,
        updates: Vec<(Filter, Value)>,
    ) -> Result<(), RepositoryError>;

    /// Delete all matching records. Returns deleted ids.
    async fn delete(&self, table: Table, filter: &Filter) -> Result<Vec<Uuid>, RepositoryError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}

/// Shallow object merge used by both backends.
pub(crate) fn merge_patch(record: &mut Value, patch: &Value) {
    if let (Value::Object(rec), Value::Object(patch)) = (record, patch) {
        for (k, v) in patch {
            rec.insert(k.clone(), v.clone());
        }
    }
}

/// Decode raw rows into their typed view.
pub fn decode<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, RepositoryError> {
    rows.into_iter()
        .map(|r| serde_json::from_value(r).map_err(|e| RepositoryError::Serialization(e.to_string())))
        .collect()
}

/// Pull the `id` field out of a stored record.
pub(crate) fn record_id(record: &Value) -> Result<Uuid, RepositoryError> {
    record
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(RepositoryError::MissingId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_exact_match_conjunction() {
        let f = Filter::new().eq("study_id", "s1").eq("status", "invited");
        assert!(f.matches(&json!({"study_id": "s1", "status": "invited", "x": 1})));
        assert!(!f.matches(&json!({"study_id": "s1", "status": "started"})));
        assert!(!f.matches(&json!({"status": "invited"})));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::new().matches(&json!({"anything": true})));
    }

    #[test]
    fn test_merge_patch_is_shallow() {
        let mut rec = json!({"a": 1, "b": {"c": 2}});
        merge_patch(&mut rec, &json!({"b": {"d": 3}, "e": 4}));
        assert_eq!(rec, json!({"a": 1, "b": {"d": 3}, "e": 4}));
    }

    #[test]
    fn test_record_id_requires_uuid() {
        assert!(record_id(&json!({"id": "not-a-uuid"})).is_err());
        let id = Uuid::new_v4();
        assert_eq!(record_id(&json!({"id": id.to_string()})).unwrap(), id);
    }
}
