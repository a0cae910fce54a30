//! ResponseIngestor — validated, idempotent response storage
//!
//! `submit` validates the payload against the task's type, upserts under a
//! per-(participant, task) lock so concurrent resubmission cannot create a
//! duplicate row, then fires lifecycle side effects: the participant's
//! first submission moves them to `started`, covering the last remaining
//! task moves them to `completed`. Every accepted submission invalidates
//! the study's cached synthesis.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::analysis::AnalysisCaches;
use crate::error::{PipelineError, PipelineResult};
use crate::lifecycle::ParticipantLifecycle;
use crate::repository::{decode, Filter, Repository, Table};
use crate::studies::load_study;
use crate::types::{
    Participant, ParticipantStatus, Response, ResponsePayload, StudyStatus, Task,
};

/// Filters for response listings. A `study_id` filter joins through the
/// participant roster.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseQuery {
    #[serde(default)]
    pub participant_id: Option<Uuid>,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub study_id: Option<Uuid>,
}

pub struct ResponseIngestor {
    repo: Arc<dyn Repository>,
    lifecycle: ParticipantLifecycle,
    caches: Arc<AnalysisCaches>,
    /// Row-level submission locks per (participant, task).
    submission_locks: DashMap<(Uuid, Uuid), Arc<Mutex<()>>>,
}

impl ResponseIngestor {
    pub fn new(repo: Arc<dyn Repository>, caches: Arc<AnalysisCaches>) -> Self {
        let lifecycle = ParticipantLifecycle::new(Arc::clone(&repo));
        Self { repo, lifecycle, caches, submission_locks: DashMap::new() }
    }

    async fn load_participant(&self, participant_id: Uuid) -> PipelineResult<Participant> {
        let rows = self
            .repo
            .read(Table::Participants, &Filter::by_id(participant_id))
            .await?;
        decode::<Participant>(rows)?
            .into_iter()
            .next()
            .ok_or(PipelineError::NotFound { entity: "participant", id: participant_id })
    }

    async fn load_task(&self, task_id: Uuid) -> PipelineResult<Task> {
        let rows = self.repo.read(Table::Tasks, &Filter::by_id(task_id)).await?;
        decode::<Task>(rows)?
            .into_iter()
            .next()
            .ok_or(PipelineError::NotFound { entity: "task", id: task_id })
    }

    /// Submit (or revise) a participant's answer to a task.
    pub async fn submit(
        &self,
        participant_id: Uuid,
        task_id: Uuid,
        payload: ResponsePayload,
    ) -> PipelineResult<Response> {
        let participant = self.load_participant(participant_id).await?;
        let task = self.load_task(task_id).await?;

        if participant.study_id != task.study_id {
            return Err(PipelineError::InvalidArgument(format!(
                "task {task_id} does not belong to participant {participant_id}'s study"
            )));
        }

        let study = load_study(self.repo.as_ref(), participant.study_id).await?;
        if study.status != StudyStatus::Active {
            return Err(PipelineError::InvalidState(format!(
                "study {} is {}, responses are only accepted while active",
                study.id, study.status
            )));
        }
        if participant.status.is_terminal() {
            return Err(PipelineError::InvalidState(format!(
                "participant {participant_id} is {}, no further submissions accepted",
                participant.status
            )));
        }

        payload
            .validate_for(task.task_type)
            .map_err(|reason| PipelineError::InvalidPayload { task_id, reason })?;

        let lock = self
            .submission_locks
            .entry((participant_id, task_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        let stored: PipelineResult<Response> = async {
            let pair_filter = Filter::new()
                .eq("participant_id", participant_id)
                .eq("task_id", task_id);
            let existing = self.repo.read(Table::Responses, &pair_filter).await?;
            let existing: Vec<Response> = decode(existing)?;

            let now = Utc::now();
            match existing.into_iter().next() {
                // Resubmission replaces the payload in place.
                Some(mut current) => {
                    self.repo
                        .update(
                            Table::Responses,
                            &Filter::by_id(current.id),
                            json!({"response_data": payload, "updated_at": now}),
                        )
                        .await?;
                    current.response_data = payload;
                    current.updated_at = now;
                    tracing::info!(response_id = %current.id, %participant_id, %task_id,
                        "response revised");
                    Ok(current)
                }
                None => {
                    let response = Response {
                        id: Uuid::new_v4(),
                        participant_id,
                        task_id,
                        response_data: payload,
                        created_at: now,
                        updated_at: now,
                    };
                    let record = serde_json::to_value(&response)
                        .map_err(|e| PipelineError::InvalidArgument(e.to_string()))?;
                    self.repo.create(Table::Responses, record).await?;
                    tracing::info!(response_id = %response.id, %participant_id, %task_id,
                        "response submitted");
                    Ok(response)
                }
            }
        }
        .await;
        drop(guard);
        // Strong count 2 means the map entry plus our clone: nobody is waiting.
        self.submission_locks
            .remove_if(&(participant_id, task_id), |_, l| Arc::strong_count(l) <= 2);
        let response = stored?;

        self.advance_lifecycle(participant_id, study.id).await?;
        self.caches.invalidate_study(study.id);

        Ok(response)
    }

    /// First submission moves `invited` to `started`; covering every task
    /// in the study moves `started` to `completed`. Works from a fresh read
    /// of the participant: a concurrent submission may already have advanced
    /// (or finished) the row between the caller's snapshot and this point.
    async fn advance_lifecycle(&self, participant_id: Uuid, study_id: Uuid) -> PipelineResult<()> {
        let participant = self.load_participant(participant_id).await?;
        if participant.status == ParticipantStatus::Dropped {
            return Ok(());
        }
        if participant.status == ParticipantStatus::Invited {
            self.lifecycle
                .transition(participant_id, ParticipantStatus::Started)
                .await?;
        }

        let task_rows = self
            .repo
            .read(Table::Tasks, &Filter::new().eq("study_id", study_id))
            .await?;
        let study_tasks: HashSet<Uuid> =
            decode::<Task>(task_rows)?.into_iter().map(|t| t.id).collect();

        let response_rows = self
            .repo
            .read(Table::Responses, &Filter::new().eq("participant_id", participant_id))
            .await?;
        let answered: HashSet<Uuid> = decode::<Response>(response_rows)?
            .into_iter()
            .map(|r| r.task_id)
            .collect();

        if !study_tasks.is_empty() && study_tasks.is_subset(&answered) {
            self.lifecycle
                .transition(participant_id, ParticipantStatus::Completed)
                .await?;
        }
        Ok(())
    }

    /// List responses by participant, task and/or study.
    pub async fn list(&self, query: &ResponseQuery) -> PipelineResult<Vec<Response>> {
        let mut filter = Filter::new();
        if let Some(participant_id) = query.participant_id {
            filter = filter.eq("participant_id", participant_id);
        }
        if let Some(task_id) = query.task_id {
            filter = filter.eq("task_id", task_id);
        }
        let rows = self.repo.read(Table::Responses, &filter).await?;
        let mut responses: Vec<Response> = decode(rows)?;

        // Study filtering joins through the participant roster.
        if let Some(study_id) = query.study_id {
            let participant_rows = self
                .repo
                .read(Table::Participants, &Filter::new().eq("study_id", study_id))
                .await?;
            let members: HashSet<Uuid> = decode::<Participant>(participant_rows)?
                .into_iter()
                .map(|p| p.id)
                .collect();
            responses.retain(|r| members.contains(&r.participant_id));
        }

        responses.sort_by_key(|r| r.created_at);
        Ok(responses)
    }
}
