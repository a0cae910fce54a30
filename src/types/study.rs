//! Study: a research engagement owning ordered tasks and enrolled participants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a study.
///
/// Only `Active` studies accept response submissions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StudyStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Archived,
}

impl std::fmt::Display for StudyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StudyStatus::Draft => write!(f, "draft"),
            StudyStatus::Active => write!(f, "active"),
            StudyStatus::Completed => write!(f, "completed"),
            StudyStatus::Archived => write!(f, "archived"),
        }
    }
}

/// A research study. Mutated only by its owning organization; task ordering
/// and participant lifecycle are delegated to the pipeline components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub created_by: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    pub status: StudyStatus,
    pub target_participants: u32,
    pub duration_days: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for creating a study. Defaults match the
/// historical service: draft status, 50 participants, 7 days.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudy {
    pub organization_id: Uuid,
    pub created_by: Uuid,
    pub name: String,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub status: Option<StudyStatus>,
    #[serde(default)]
    pub target_participants: Option<u32>,
    #[serde(default)]
    pub duration_days: Option<u32>,
}
