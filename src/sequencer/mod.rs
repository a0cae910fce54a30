//! TaskSequencer — study-scoped task ordering
//!
//! Owns every write to `order_index`. Appends take `max + 1`; reorder is
//! "replace the whole order": the caller submits a full permutation of the
//! study's task IDs and all indices are rewritten to 1..N in one atomic
//! repository batch. Partial reorders are rejected so two concurrent
//! editors cannot silently drop or orphan an index.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::repository::{decode, Filter, Repository, Table};
use crate::studies::load_study;
use crate::types::{NewTask, Task, TaskPatch};

pub struct TaskSequencer {
    repo: Arc<dyn Repository>,
}

impl TaskSequencer {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Create a task. With `order_index` omitted the task is appended after
    /// the study's current maximum.
    pub async fn add_task(&self, new: NewTask) -> PipelineResult<Task> {
        load_study(self.repo.as_ref(), new.study_id).await?;

        if new.title.trim().is_empty() {
            return Err(PipelineError::InvalidArgument("task title is required".into()));
        }

        let existing = self.list(new.study_id).await?;
        let order_index = match new.order_index {
            Some(explicit) => {
                if existing.iter().any(|t| t.order_index == explicit) {
                    return Err(PipelineError::InvalidArgument(format!(
                        "order_index {explicit} is already taken in study {}",
                        new.study_id
                    )));
                }
                explicit
            }
            None => existing.iter().map(|t| t.order_index).max().unwrap_or(0) + 1,
        };

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            study_id: new.study_id,
            task_type: new.task_type,
            title: new.title,
            instructions: new.instructions,
            order_index,
            created_at: now,
            updated_at: now,
        };

        let record = serde_json::to_value(&task)
            .map_err(|e| PipelineError::InvalidArgument(e.to_string()))?;
        self.repo.create(Table::Tasks, record).await?;

        tracing::info!(task_id = %task.id, study_id = %task.study_id,
            task_type = %task.task_type, order_index, "task created");
        Ok(task)
    }

    /// List a study's tasks sorted ascending by `order_index`, with
    /// `created_at` breaking ties for rows mutated out of band.
    pub async fn list(&self, study_id: Uuid) -> PipelineResult<Vec<Task>> {
        let rows = self
            .repo
            .read(Table::Tasks, &Filter::new().eq("study_id", study_id))
            .await?;
        let mut tasks: Vec<Task> = decode(rows)?;
        tasks.sort_by(|a, b| {
            a.order_index
                .cmp(&b.order_index)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(tasks)
    }

    pub async fn get(&self, task_id: Uuid) -> PipelineResult<Task> {
        let rows = self.repo.read(Table::Tasks, &Filter::by_id(task_id)).await?;
        decode::<Task>(rows)?
            .into_iter()
            .next()
            .ok_or(PipelineError::NotFound { entity: "task", id: task_id })
    }

    /// Rewrite a study's order to 1..N following `ordered_task_ids`.
    ///
    /// The supplied IDs must be exactly the study's current task set. All
    /// indices land atomically; a concurrent `list` never observes a
    /// half-applied permutation.
    pub async fn reorder(&self, study_id: Uuid, ordered_task_ids: &[Uuid]) -> PipelineResult<()> {
        load_study(self.repo.as_ref(), study_id).await?;

        let current = self.list(study_id).await?;
        let current_ids: HashSet<Uuid> = current.iter().map(|t| t.id).collect();
        let supplied: HashSet<Uuid> = ordered_task_ids.iter().copied().collect();

        if supplied.len() != ordered_task_ids.len() {
            return Err(PipelineError::InvalidArgument(format!(
                "reorder for study {study_id} contains duplicate task ids"
            )));
        }
        if supplied != current_ids {
            return Err(PipelineError::InvalidArgument(format!(
                "reorder for study {study_id} must supply exactly its {} current task ids, got {}",
                current_ids.len(),
                ordered_task_ids.len()
            )));
        }

        let now = Utc::now();
        let updates = ordered_task_ids
            .iter()
            .enumerate()
            .map(|(i, task_id)| {
                (
                    Filter::by_id(*task_id).eq("study_id", study_id),
                    json!({"order_index": (i + 1) as u32, "updated_at": now}),
                )
            })
            .collect();

        self.repo.update_many(Table::Tasks, updates).await?;

        tracing::info!(%study_id, count = ordered_task_ids.len(), "tasks reordered");
        Ok(())
    }

    pub async fn update(&self, task_id: Uuid, patch: TaskPatch) -> PipelineResult<Task> {
        self.get(task_id).await?;

        let mut fields = serde_json::Map::new();
        if let Some(task_type) = patch.task_type {
            fields.insert("type".into(), json!(task_type));
        }
        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(PipelineError::InvalidArgument("task title must be non-empty".into()));
            }
            fields.insert("title".into(), json!(title));
        }
        if let Some(instructions) = patch.instructions {
            fields.insert("instructions".into(), json!(instructions));
        }
        fields.insert("updated_at".into(), json!(Utc::now()));

        self.repo
            .update(Table::Tasks, &Filter::by_id(task_id), serde_json::Value::Object(fields))
            .await?;
        self.get(task_id).await
    }

    /// Delete a task; its responses are orphan-deleted with it.
    pub async fn delete(&self, task_id: Uuid) -> PipelineResult<Uuid> {
        self.get(task_id).await?;
        self.repo
            .delete(Table::Responses, &Filter::new().eq("task_id", task_id))
            .await?;
        self.repo.delete(Table::Tasks, &Filter::by_id(task_id)).await?;
        tracing::info!(%task_id, "task deleted with responses");
        Ok(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use crate::studies::StudyService;
    use crate::types::{NewStudy, TaskType};

    async fn setup() -> (TaskSequencer, Uuid) {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let studies = StudyService::new(Arc::clone(&repo));
        let study = studies
            .create(NewStudy {
                organization_id: Uuid::new_v4(),
                created_by: Uuid::new_v4(),
                name: "Coffee rituals".into(),
                objective: None,
                status: None,
                target_participants: None,
                duration_days: None,
            })
            .await
            .unwrap();
        (TaskSequencer::new(repo), study.id)
    }

    fn new_task(study_id: Uuid, task_type: TaskType, title: &str) -> NewTask {
        NewTask {
            study_id,
            task_type,
            title: title.to_string(),
            instructions: None,
            order_index: None,
        }
    }

    #[tokio::test]
    async fn test_append_assigns_max_plus_one() {
        let (seq, study_id) = setup().await;
        let t1 = seq.add_task(new_task(study_id, TaskType::Camera, "Pantry photo")).await.unwrap();
        let t2 = seq.add_task(new_task(study_id, TaskType::Discussion, "Why?")).await.unwrap();
        assert_eq!(t1.order_index, 1);
        assert_eq!(t2.order_index, 2);
    }

    #[tokio::test]
    async fn test_add_task_unknown_study_fails() {
        let (seq, _study_id) = setup().await;
        let err = seq
            .add_task(new_task(Uuid::new_v4(), TaskType::Camera, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { entity: "study", .. }));
    }

    #[tokio::test]
    async fn test_list_is_strictly_increasing_after_edits() {
        let (seq, study_id) = setup().await;
        for i in 0..5 {
            seq.add_task(new_task(study_id, TaskType::Discussion, &format!("t{i}")))
                .await
                .unwrap();
        }
        let tasks = seq.list(study_id).await.unwrap();
        let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
        let reversed: Vec<Uuid> = ids.iter().rev().copied().collect();
        seq.reorder(study_id, &reversed).await.unwrap();

        let tasks = seq.list(study_id).await.unwrap();
        let orders: Vec<u32> = tasks.iter().map(|t| t.order_index).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
        assert!(orders.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(tasks[0].id, reversed[0]);
    }

    #[tokio::test]
    async fn test_reorder_rejects_wrong_id_set() {
        let (seq, study_id) = setup().await;
        let t1 = seq.add_task(new_task(study_id, TaskType::Camera, "a")).await.unwrap();
        let t2 = seq.add_task(new_task(study_id, TaskType::Gallery, "b")).await.unwrap();

        // Missing one id
        let err = seq.reorder(study_id, &[t1.id]).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));

        // Foreign id swapped in
        let err = seq.reorder(study_id, &[t1.id, Uuid::new_v4()]).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));

        // Duplicate id
        let err = seq.reorder(study_id, &[t1.id, t1.id]).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));

        // Ordering unchanged after the failures
        let tasks = seq.list(study_id).await.unwrap();
        assert_eq!(tasks[0].id, t1.id);
        assert_eq!(tasks[1].id, t2.id);
        assert_eq!(tasks[0].order_index, 1);
        assert_eq!(tasks[1].order_index, 2);
    }

    #[tokio::test]
    async fn test_explicit_index_honored() {
        let (seq, study_id) = setup().await;
        let mut new = new_task(study_id, TaskType::FillBlanks, "blank");
        new.order_index = Some(10);
        let t = seq.add_task(new).await.unwrap();
        assert_eq!(t.order_index, 10);

        // Next append lands after the explicit index.
        let t2 = seq.add_task(new_task(study_id, TaskType::Camera, "next")).await.unwrap();
        assert_eq!(t2.order_index, 11);
    }

    #[tokio::test]
    async fn test_explicit_index_collision_rejected() {
        let (seq, study_id) = setup().await;
        let mut first = new_task(study_id, TaskType::FillBlanks, "first");
        first.order_index = Some(1);
        seq.add_task(first).await.unwrap();

        let mut second = new_task(study_id, TaskType::Camera, "second");
        second.order_index = Some(1);
        let err = seq.add_task(second).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));

        // Index assignments stay unique after the rejection.
        let tasks = seq.list(study_id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].order_index, 1);
    }

    #[tokio::test]
    async fn test_update_rejects_blank_title() {
        let (seq, study_id) = setup().await;
        let t = seq.add_task(new_task(study_id, TaskType::Camera, "a")).await.unwrap();
        let err = seq
            .update(t.id, TaskPatch { title: Some("  ".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_update_task_type() {
        let (seq, study_id) = setup().await;
        let t = seq.add_task(new_task(study_id, TaskType::Camera, "a")).await.unwrap();
        let updated = seq
            .update(t.id, TaskPatch { task_type: Some(TaskType::Collage), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.task_type, TaskType::Collage);
    }
}
