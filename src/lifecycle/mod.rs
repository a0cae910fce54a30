//! ParticipantLifecycle — enrollment and status transitions
//!
//! Enrollment starts a participant at `invited` with `invited_at` stamped.
//! `transition` enforces the legal graph and stamps the matching timestamp
//! exactly once, so retried transitions are idempotent. Bulk enrollment is
//! best-effort: one bad contact never aborts the batch.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::repository::{decode, Filter, Repository, Table};
use crate::studies::load_study;
use crate::types::{
    BulkEnrollFailure, BulkEnrollOutcome, Participant, ParticipantPatch, ParticipantStatus,
};

/// Optional exact-match filters for participant listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParticipantQuery {
    #[serde(default)]
    pub study_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<ParticipantStatus>,
}

pub struct ParticipantLifecycle {
    repo: Arc<dyn Repository>,
}

impl ParticipantLifecycle {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Enroll a single participant at status `invited`.
    pub async fn enroll(
        &self,
        study_id: Uuid,
        contact: &str,
        demographics: Option<serde_json::Value>,
    ) -> PipelineResult<Participant> {
        load_study(self.repo.as_ref(), study_id).await?;

        if contact.trim().is_empty() {
            return Err(PipelineError::InvalidArgument("participant contact is required".into()));
        }

        let now = Utc::now();
        let participant = Participant {
            id: Uuid::new_v4(),
            study_id,
            contact: contact.trim().to_string(),
            demographics,
            status: ParticipantStatus::Invited,
            invited_at: Some(now),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let record = serde_json::to_value(&participant)
            .map_err(|e| PipelineError::InvalidArgument(e.to_string()))?;
        self.repo.create(Table::Participants, record).await?;

        tracing::info!(participant_id = %participant.id, %study_id, "participant enrolled");
        Ok(participant)
    }

    /// Enroll many contacts at once, best-effort.
    ///
    /// A failing contact is recorded, not thrown; only an empty batch or a
    /// missing study fails the call itself.
    pub async fn bulk_enroll(
        &self,
        study_id: Uuid,
        contacts: &[String],
        demographics: Option<serde_json::Value>,
    ) -> PipelineResult<BulkEnrollOutcome> {
        load_study(self.repo.as_ref(), study_id).await?;

        if contacts.is_empty() {
            return Err(PipelineError::InvalidArgument(format!(
                "bulk enrollment for study {study_id} requires at least one contact"
            )));
        }

        let mut created = 0;
        let mut failures = Vec::new();
        for contact in contacts {
            match self.enroll(study_id, contact, demographics.clone()).await {
                Ok(_) => created += 1,
                Err(e) => {
                    tracing::warn!(%study_id, contact = %contact, error = %e,
                        "bulk enrollment: contact skipped");
                    failures.push(BulkEnrollFailure {
                        contact: contact.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(%study_id, created, requested = contacts.len(), "bulk enrollment finished");
        Ok(BulkEnrollOutcome { created, requested: contacts.len(), failures })
    }

    pub async fn get(&self, participant_id: Uuid) -> PipelineResult<Participant> {
        let rows = self
            .repo
            .read(Table::Participants, &Filter::by_id(participant_id))
            .await?;
        decode::<Participant>(rows)?
            .into_iter()
            .next()
            .ok_or(PipelineError::NotFound { entity: "participant", id: participant_id })
    }

    pub async fn list(&self, query: &ParticipantQuery) -> PipelineResult<Vec<Participant>> {
        let mut filter = Filter::new();
        if let Some(study_id) = query.study_id {
            filter = filter.eq("study_id", study_id);
        }
        if let Some(status) = query.status {
            filter = filter.eq("status", status);
        }
        let rows = self.repo.read(Table::Participants, &filter).await?;
        Ok(decode(rows)?)
    }

    /// Apply a status transition along the legal graph.
    ///
    /// Re-applying the current status is a no-op (idempotent for retries);
    /// any other illegal move is `InvalidTransition` and leaves the row
    /// untouched. The timestamp matching the new state is stamped only if
    /// not already set.
    pub async fn transition(
        &self,
        participant_id: Uuid,
        next: ParticipantStatus,
    ) -> PipelineResult<Participant> {
        let participant = self.get(participant_id).await?;

        if participant.status == next {
            return Ok(participant);
        }
        if !participant.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                participant_id,
                from: participant.status,
                to: next,
            });
        }

        let now = Utc::now();
        let mut fields = serde_json::Map::new();
        fields.insert("status".into(), json!(next));
        fields.insert("updated_at".into(), json!(now));
        match next {
            ParticipantStatus::Started if participant.started_at.is_none() => {
                fields.insert("started_at".into(), json!(now));
            }
            ParticipantStatus::Completed if participant.completed_at.is_none() => {
                fields.insert("completed_at".into(), json!(now));
            }
            _ => {}
        }

        self.repo
            .update(
                Table::Participants,
                &Filter::by_id(participant_id),
                serde_json::Value::Object(fields),
            )
            .await?;

        tracing::info!(%participant_id, from = %participant.status, to = %next,
            "participant transitioned");
        self.get(participant_id).await
    }

    /// Update contact/demographics. Status changes must go through
    /// [`Self::transition`].
    pub async fn update(
        &self,
        participant_id: Uuid,
        patch: ParticipantPatch,
    ) -> PipelineResult<Participant> {
        self.get(participant_id).await?;

        let mut fields = serde_json::Map::new();
        if let Some(contact) = patch.contact {
            if contact.trim().is_empty() {
                return Err(PipelineError::InvalidArgument(
                    "participant contact must be non-empty".into(),
                ));
            }
            fields.insert("contact".into(), json!(contact.trim()));
        }
        if let Some(demographics) = patch.demographics {
            fields.insert("demographics".into(), demographics);
        }
        fields.insert("updated_at".into(), json!(Utc::now()));

        self.repo
            .update(
                Table::Participants,
                &Filter::by_id(participant_id),
                serde_json::Value::Object(fields),
            )
            .await?;
        self.get(participant_id).await
    }

    /// Delete a participant; their responses are orphan-deleted with them.
    pub async fn delete(&self, participant_id: Uuid) -> PipelineResult<Uuid> {
        self.get(participant_id).await?;
        self.repo
            .delete(Table::Responses, &Filter::new().eq("participant_id", participant_id))
            .await?;
        self.repo
            .delete(Table::Participants, &Filter::by_id(participant_id))
            .await?;
        tracing::info!(%participant_id, "participant deleted with responses");
        Ok(participant_id)
    }
}
