//! Durable repository backend over sled
//!
//! One tree per table, keys are UUID strings, values are JSON. Multi-row
//! updates go through `sled::Batch` so they land atomically.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::{merge_patch, record_id, Filter, Repository, RepositoryError, Table};

#[derive(Clone)]
pub struct SledRepository {
    trees: Arc<HashMap<Table, sled::Tree>>,
    _db: Arc<sled::Db>,
}

impl SledRepository {
    /// Open or create the database at `path`, one tree per known table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let db = sled::open(path.as_ref())
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        let mut trees = HashMap::new();
        for table in Table::ALL {
            let tree = db
                .open_tree(table.name())
                .map_err(|e| RepositoryError::Storage(e.to_string()))?;
            trees.insert(table, tree);
        }

        tracing::info!(path = ?path.as_ref(), "sled repository opened");

        Ok(Self { trees: Arc::new(trees), _db: Arc::new(db) })
    }

    fn tree(&self, table: Table) -> &sled::Tree {
        // Every Table variant gets a tree in open(); the map is total.
        &self.trees[&table]
    }

    fn scan(&self, table: Table, filter: &Filter) -> Result<Vec<(Uuid, Value)>, RepositoryError> {
        let mut out = Vec::new();
        for item in self.tree(table).iter() {
            let (_key, bytes) = item.map_err(|e| RepositoryError::Storage(e.to_string()))?;
            let record: Value = serde_json::from_slice(&bytes)
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
            if filter.matches(&record) {
                let id = record_id(&record)?;
                out.push((id, record));
            }
        }
        Ok(out)
    }

    fn put(&self, table: Table, id: Uuid, record: &Value) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        self.tree(table)
            .insert(id.to_string().as_bytes(), bytes)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(())
    }

    fn flush(&self, table: Table) -> Result<(), RepositoryError> {
        self.tree(table)
            .flush()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Repository for SledRepository {
    async fn create(&self, table: Table, record: Value) -> Result<Uuid, RepositoryError> {
        let id = record_id(&record)?;
        self.put(table, id, &record)?;
        self.flush(table)?;
        tracing::debug!(table = table.name(), %id, "record created");
        Ok(id)
    }

    async fn read(&self, table: Table, filter: &Filter) -> Result<Vec<Value>, RepositoryError> {
        Ok(self.scan(table, filter)?.into_iter().map(|(_, r)| r).collect())
    }

    async fn update(
        &self,
        table: Table,
        filter: &Filter,
        patch: Value,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        let mut affected = Vec::new();
        for (id, mut record) in self.scan(table, filter)? {
            merge_patch(&mut record, &patch);
            self.put(table, id, &record)?;
            affected.push(id);
        }
        self.flush(table)?;
        Ok(affected)
    }

    async fn update_many(
        &self,
        table: Table,
        updates: Vec<(Filter, Value)>,
    ) -> Result<(), RepositoryError> {
        // Resolve every patch against current rows first, then apply the
        // whole set as a single batch. A crash mid-write cannot leave a
        // partially applied batch.
        let mut batch = sled::Batch::default();
        for (filter, patch) in &updates {
            for (id, mut record) in self.scan(table, filter)? {
                merge_patch(&mut record, patch);
                let bytes = serde_json::to_vec(&record)
                    .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
                batch.insert(id.to_string().as_bytes(), bytes);
            }
        }
        self.tree(table)
            .apply_batch(batch)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        self.flush(table)?;
        Ok(())
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<Vec<Uuid>, RepositoryError> {
        let mut deleted = Vec::new();
        for (id, _) in self.scan(table, filter)? {
            self.tree(table)
                .remove(id.to_string().as_bytes())
                .map_err(|e| RepositoryError::Storage(e.to_string()))?;
            deleted.push(id);
        }
        self.flush(table)?;
        Ok(deleted)
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_temp() -> (SledRepository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let repo = SledRepository::open(dir.path()).unwrap();
        (repo, dir)
    }

    fn record(id: Uuid, study: &str, order: u32) -> Value {
        json!({"id": id.to_string(), "study_id": study, "order_index": order})
    }

    #[tokio::test]
    async fn test_create_read_round_trip() {
        let (repo, _dir) = open_temp();
        let id = Uuid::new_v4();
        repo.create(Table::Tasks, record(id, "s1", 1)).await.unwrap();

        let rows = repo.read(Table::Tasks, &Filter::by_id(id)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["order_index"], 1);
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let (repo, _dir) = open_temp();
        let id = Uuid::new_v4();
        repo.create(Table::Tasks, record(id, "s1", 1)).await.unwrap();

        let affected = repo
            .update(Table::Tasks, &Filter::by_id(id), json!({"order_index": 7}))
            .await
            .unwrap();
        assert_eq!(affected, vec![id]);

        let rows = repo.read(Table::Tasks, &Filter::by_id(id)).await.unwrap();
        assert_eq!(rows[0]["order_index"], 7);
        assert_eq!(rows[0]["study_id"], "s1");
    }

    #[tokio::test]
    async fn test_update_many_applies_all() {
        let (repo, _dir) = open_temp();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        repo.create(Table::Tasks, record(a, "s1", 1)).await.unwrap();
        repo.create(Table::Tasks, record(b, "s1", 2)).await.unwrap();

        repo.update_many(
            Table::Tasks,
            vec![
                (Filter::by_id(a), json!({"order_index": 2})),
                (Filter::by_id(b), json!({"order_index": 1})),
            ],
        )
        .await
        .unwrap();

        let rows = repo
            .read(Table::Tasks, &Filter::new().eq("study_id", "s1"))
            .await
            .unwrap();
        let mut orders: Vec<(String, u64)> = rows
            .iter()
            .map(|r| (r["id"].as_str().unwrap().to_string(), r["order_index"].as_u64().unwrap()))
            .collect();
        orders.sort_by_key(|(_, o)| *o);
        assert_eq!(orders[0].0, b.to_string());
        assert_eq!(orders[1].0, a.to_string());
    }

    #[tokio::test]
    async fn test_delete_by_filter() {
        let (repo, _dir) = open_temp();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        repo.create(Table::Tasks, record(a, "s1", 1)).await.unwrap();
        repo.create(Table::Tasks, record(b, "s2", 1)).await.unwrap();

        let deleted = repo
            .delete(Table::Tasks, &Filter::new().eq("study_id", "s1"))
            .await
            .unwrap();
        assert_eq!(deleted, vec![a]);

        let remaining = repo.read(Table::Tasks, &Filter::new()).await.unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_tables_are_isolated() {
        let (repo, _dir) = open_temp();
        let id = Uuid::new_v4();
        repo.create(Table::Tasks, record(id, "s1", 1)).await.unwrap();

        let rows = repo.read(Table::Participants, &Filter::new()).await.unwrap();
        assert!(rows.is_empty());
    }
}
