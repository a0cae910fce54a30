//! Response: a participant's recorded answer to one task
//!
//! The payload is a tagged union keyed by the owning task's type, validated
//! at the ingestion boundary instead of stored as an untyped blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TaskType;

/// Tagged response payload. One variant per payload shape; several task
/// types share a shape (gallery and collage both carry media URLs).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponsePayload {
    /// Free text (discussion tasks).
    Text { text: String },
    /// Media URL list (camera, gallery, collage tasks).
    MediaUrls { urls: Vec<String> },
    /// Items in ranked order, best first (classification tasks).
    RankedItems { items: Vec<RankedItem> },
    /// Ordered blank completions (fill_blanks tasks).
    FillBlanks { answers: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedItem {
    pub label: String,
    pub rank: u32,
}

impl ResponsePayload {
    /// Check this payload's shape against the owning task's type.
    ///
    /// Returns the human-readable reason on mismatch; the ingestor wraps it
    /// into `InvalidPayload` with the task id attached.
    pub fn validate_for(&self, task_type: TaskType) -> Result<(), String> {
        match (task_type, self) {
            (TaskType::Discussion, ResponsePayload::Text { text }) => {
                if text.trim().is_empty() {
                    Err("discussion response text must be non-empty".into())
                } else {
                    Ok(())
                }
            }
            (
                TaskType::Camera | TaskType::Gallery | TaskType::Collage,
                ResponsePayload::MediaUrls { urls },
            ) => {
                if urls.is_empty() {
                    Err(format!("{task_type} response requires at least one media URL"))
                } else if let Some(bad) = urls.iter().find(|u| u.trim().is_empty()) {
                    Err(format!("empty media URL in {task_type} response: {bad:?}"))
                } else {
                    Ok(())
                }
            }
            (TaskType::Classification, ResponsePayload::RankedItems { items }) => {
                if items.is_empty() {
                    return Err("classification response requires at least one ranked item".into());
                }
                let mut ranks: Vec<u32> = items.iter().map(|i| i.rank).collect();
                ranks.sort_unstable();
                ranks.dedup();
                if ranks.len() != items.len() {
                    Err("classification ranks must be unique".into())
                } else {
                    Ok(())
                }
            }
            (TaskType::FillBlanks, ResponsePayload::FillBlanks { answers }) => {
                if answers.is_empty() || answers.iter().all(|a| a.trim().is_empty()) {
                    Err("fill_blanks response requires at least one non-empty answer".into())
                } else {
                    Ok(())
                }
            }
            (expected, got) => Err(format!(
                "payload kind {} does not match task type {expected}",
                got.kind_name()
            )),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            ResponsePayload::Text { .. } => "text",
            ResponsePayload::MediaUrls { .. } => "media_urls",
            ResponsePayload::RankedItems { .. } => "ranked_items",
            ResponsePayload::FillBlanks { .. } => "fill_blanks",
        }
    }

    /// Textual rendering sent to the inference collaborator. Non-text
    /// payloads go through a caption/description proxy.
    pub fn as_analysis_text(&self) -> String {
        match self {
            ResponsePayload::Text { text } => text.clone(),
            ResponsePayload::MediaUrls { urls } => {
                format!("Participant submitted {} media item(s): {}", urls.len(), urls.join(", "))
            }
            ResponsePayload::RankedItems { items } => {
                let mut sorted = items.clone();
                sorted.sort_by_key(|i| i.rank);
                let ordered: Vec<String> =
                    sorted.iter().map(|i| format!("{}. {}", i.rank, i.label)).collect();
                format!("Participant ranked items: {}", ordered.join("; "))
            }
            ResponsePayload::FillBlanks { answers } => {
                format!("Participant completed blanks: {}", answers.join(" | "))
            }
        }
    }
}

/// A stored response. At most one row exists per (participant, task) pair;
/// resubmission replaces the payload in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub task_id: Uuid,
    pub response_data: ResponsePayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
