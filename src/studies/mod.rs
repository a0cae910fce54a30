//! Study service
//!
//! Minimal study CRUD the pipeline itself depends on: studies must exist to
//! gate task creation, and only `active` studies accept responses. Deleting
//! a study cascades to its tasks, participants and their responses.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::repository::{decode, Filter, Repository, Table};
use crate::types::{NewStudy, Study, StudyStatus};

/// Optional exact-match filters for study listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudyQuery {
    #[serde(default)]
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<StudyStatus>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

/// Patchable study fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudyPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub status: Option<StudyStatus>,
    #[serde(default)]
    pub target_participants: Option<u32>,
    #[serde(default)]
    pub duration_days: Option<u32>,
}

/// Load a study row or fail with `NotFound`. Shared by the sequencer,
/// lifecycle and ingestor for existence/status gates.
pub async fn load_study(repo: &dyn Repository, study_id: Uuid) -> PipelineResult<Study> {
    let rows = repo.read(Table::Studies, &Filter::by_id(study_id)).await?;
    decode::<Study>(rows)?
        .into_iter()
        .next()
        .ok_or(PipelineError::NotFound { entity: "study", id: study_id })
}

pub struct StudyService {
    repo: Arc<dyn Repository>,
}

impl StudyService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, new: NewStudy) -> PipelineResult<Study> {
        if new.name.trim().is_empty() {
            return Err(PipelineError::InvalidArgument("study name is required".into()));
        }

        let now = Utc::now();
        let study = Study {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            created_by: new.created_by,
            name: new.name,
            objective: new.objective,
            status: new.status.unwrap_or_default(),
            target_participants: new.target_participants.unwrap_or(50),
            duration_days: new.duration_days.unwrap_or(7),
            created_at: now,
            updated_at: now,
        };

        let record = serde_json::to_value(&study)
            .map_err(|e| PipelineError::InvalidArgument(e.to_string()))?;
        self.repo.create(Table::Studies, record).await?;

        tracing::info!(study_id = %study.id, name = %study.name, "study created");
        Ok(study)
    }

    pub async fn get(&self, study_id: Uuid) -> PipelineResult<Study> {
        load_study(self.repo.as_ref(), study_id).await
    }

    pub async fn list(&self, query: &StudyQuery) -> PipelineResult<Vec<Study>> {
        let mut filter = Filter::new();
        if let Some(org) = query.organization_id {
            filter = filter.eq("organization_id", org);
        }
        if let Some(status) = query.status {
            filter = filter.eq("status", status);
        }
        if let Some(creator) = query.created_by {
            filter = filter.eq("created_by", creator);
        }
        let rows = self.repo.read(Table::Studies, &filter).await?;
        Ok(decode(rows)?)
    }

    pub async fn update(&self, study_id: Uuid, patch: StudyPatch) -> PipelineResult<Study> {
        // Existence check first so the caller gets NotFound, not a no-op.
        load_study(self.repo.as_ref(), study_id).await?;

        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(PipelineError::InvalidArgument("study name must be non-empty".into()));
            }
        }

        let mut fields = serde_json::Map::new();
        if let Some(name) = patch.name {
            fields.insert("name".into(), json!(name));
        }
        if let Some(objective) = patch.objective {
            fields.insert("objective".into(), json!(objective));
        }
        if let Some(status) = patch.status {
            fields.insert("status".into(), json!(status));
        }
        if let Some(target) = patch.target_participants {
            fields.insert("target_participants".into(), json!(target));
        }
        if let Some(days) = patch.duration_days {
            fields.insert("duration_days".into(), json!(days));
        }
        fields.insert("updated_at".into(), json!(Utc::now()));

        self.repo
            .update(Table::Studies, &Filter::by_id(study_id), serde_json::Value::Object(fields))
            .await?;

        load_study(self.repo.as_ref(), study_id).await
    }

    /// Delete a study and everything it owns: tasks, participants, and the
    /// responses hanging off either.
    pub async fn delete(&self, study_id: Uuid) -> PipelineResult<Uuid> {
        load_study(self.repo.as_ref(), study_id).await?;

        let scoped = Filter::new().eq("study_id", study_id);

        let participant_ids = self.repo.delete(Table::Participants, &scoped).await?;
        for pid in &participant_ids {
            self.repo
                .delete(Table::Responses, &Filter::new().eq("participant_id", *pid))
                .await?;
        }
        let task_ids = self.repo.delete(Table::Tasks, &scoped).await?;
        for tid in &task_ids {
            self.repo
                .delete(Table::Responses, &Filter::new().eq("task_id", *tid))
                .await?;
        }
        self.repo.delete(Table::Studies, &Filter::by_id(study_id)).await?;

        tracing::info!(
            %study_id,
            tasks = task_ids.len(),
            participants = participant_ids.len(),
            "study deleted with cascade"
        );
        Ok(study_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn service() -> StudyService {
        StudyService::new(Arc::new(MemoryRepository::new()))
    }

    fn new_study(name: &str) -> NewStudy {
        NewStudy {
            organization_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            name: name.to_string(),
            objective: None,
            status: None,
            target_participants: None,
            duration_days: None,
        }
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let svc = service();
        let study = svc.create(new_study("Snack habits")).await.unwrap();
        assert_eq!(study.status, StudyStatus::Draft);
        assert_eq!(study.target_participants, 50);
        assert_eq!(study.duration_days, 7);
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let svc = service();
        let err = svc.create(new_study("  ")).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let svc = service();
        let err = svc.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { entity: "study", .. }));
    }

    #[tokio::test]
    async fn test_update_status() {
        let svc = service();
        let study = svc.create(new_study("Snack habits")).await.unwrap();
        let updated = svc
            .update(study.id, StudyPatch { status: Some(StudyStatus::Active), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.status, StudyStatus::Active);
        assert!(updated.updated_at >= study.updated_at);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let svc = service();
        svc.create(new_study("a")).await.unwrap();
        let s = svc.create(new_study("b")).await.unwrap();
        svc.update(s.id, StudyPatch { status: Some(StudyStatus::Active), ..Default::default() })
            .await
            .unwrap();

        let active = svc
            .list(&StudyQuery { status: Some(StudyStatus::Active), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, s.id);
    }
}
