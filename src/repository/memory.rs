//! In-memory repository for tests and minimal deployments
//!
//! Thread-safe via `RwLock`. Not durable. `update_many` holds the write
//! lock for the whole batch, so readers never observe a partial application.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::{merge_patch, record_id, Filter, Repository, RepositoryError, Table};

#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<HashMap<Table, BTreeMap<String, Value>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create(&self, table: Table, record: Value) -> Result<Uuid, RepositoryError> {
        let id = record_id(&record)?;
        let mut tables = self
            .tables
            .write()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        tables.entry(table).or_default().insert(id.to_string(), record);
        Ok(id)
    }

    async fn read(&self, table: Table, filter: &Filter) -> Result<Vec<Value>, RepositoryError> {
        let tables = self
            .tables
            .read()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(tables
            .get(&table)
            .map(|rows| rows.values().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn update(
        &self,
        table: Table,
        filter: &Filter,
        patch: Value,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let mut affected = Vec::new();
        if let Some(rows) = tables.get_mut(&table) {
            for record in rows.values_mut().filter(|r| filter.matches(r)) {
                merge_patch(record, &patch);
                affected.push(record_id(record)?);
            }
        }
        Ok(affected)
    }

    async fn update_many(
        &self,
        table: Table,
        updates: Vec<(Filter, Value)>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let rows = tables.entry(table).or_default();
        for (filter, patch) in &updates {
            for record in rows.values_mut().filter(|r| filter.matches(r)) {
                merge_patch(record, patch);
            }
        }
        Ok(())
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<Vec<Uuid>, RepositoryError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let mut deleted = Vec::new();
        if let Some(rows) = tables.get_mut(&table) {
            let keys: Vec<String> = rows
                .iter()
                .filter(|(_, r)| filter.matches(r))
                .map(|(k, _)| k.clone())
                .collect();
            for key in keys {
                if let Some(record) = rows.remove(&key) {
                    deleted.push(record_id(&record)?);
                }
            }
        }
        Ok(deleted)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_filtered_read() {
        let repo = MemoryRepository::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        repo.create(Table::Participants, json!({"id": a.to_string(), "status": "invited"}))
            .await
            .unwrap();
        repo.create(Table::Participants, json!({"id": b.to_string(), "status": "started"}))
            .await
            .unwrap();

        let invited = repo
            .read(Table::Participants, &Filter::new().eq("status", "invited"))
            .await
            .unwrap();
        assert_eq!(invited.len(), 1);
        assert_eq!(invited[0]["id"], a.to_string());
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let repo: Box<dyn Repository> = Box::new(MemoryRepository::new());
        assert_eq!(repo.backend_name(), "memory");
        let id = Uuid::new_v4();
        repo.create(Table::Studies, json!({"id": id.to_string()})).await.unwrap();
        assert_eq!(repo.read(Table::Studies, &Filter::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_returns_ids() {
        let repo = MemoryRepository::new();
        let id = Uuid::new_v4();
        repo.create(Table::Responses, json!({"id": id.to_string(), "task_id": "t"}))
            .await
            .unwrap();
        let deleted = repo
            .delete(Table::Responses, &Filter::new().eq("task_id", "t"))
            .await
            .unwrap();
        assert_eq!(deleted, vec![id]);
    }
}
