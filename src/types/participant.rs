//! Participant: an individual progressing through a study's tasks
//!
//! Status forms a small state machine:
//!
//! ```text
//! invited --(first task opened)--> started
//! started --(all tasks submitted)--> completed
//! {invited, started} --(removal / timeout)--> dropped
//! ```
//!
//! `completed` and `dropped` are terminal. Timestamps are stamped exactly
//! once, at the transition into the matching state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    #[default]
    Invited,
    Started,
    Completed,
    Dropped,
}

impl ParticipantStatus {
    /// Legal edges of the lifecycle graph.
    pub fn can_transition_to(self, next: ParticipantStatus) -> bool {
        use ParticipantStatus::*;
        matches!(
            (self, next),
            (Invited, Started) | (Started, Completed) | (Invited, Dropped) | (Started, Dropped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ParticipantStatus::Completed | ParticipantStatus::Dropped)
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticipantStatus::Invited => write!(f, "invited"),
            ParticipantStatus::Started => write!(f, "started"),
            ParticipantStatus::Completed => write!(f, "completed"),
            ParticipantStatus::Dropped => write!(f, "dropped"),
        }
    }
}

/// A participant enrolled in exactly one study.
///
/// `contact` is an email or phone, unique-ish within the study (not
/// globally). `demographics` is an open attribute bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub study_id: Uuid,
    pub contact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demographics: Option<serde_json::Value>,
    pub status: ParticipantStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invited_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Patchable participant fields. Status changes must go through the
/// lifecycle transition endpoint, never a raw update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParticipantPatch {
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub demographics: Option<serde_json::Value>,
}

/// Outcome of a best-effort bulk enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct BulkEnrollOutcome {
    pub created: usize,
    pub requested: usize,
    /// Per-contact failures; the batch itself still succeeds.
    pub failures: Vec<BulkEnrollFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkEnrollFailure {
    pub contact: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ParticipantStatus::*;

    #[test]
    fn test_legal_transitions() {
        assert!(Invited.can_transition_to(Started));
        assert!(Started.can_transition_to(Completed));
        assert!(Invited.can_transition_to(Dropped));
        assert!(Started.can_transition_to(Dropped));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Invited.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Started));
        assert!(!Dropped.can_transition_to(Invited));
        assert!(!Completed.can_transition_to(Dropped));
        assert!(!Started.can_transition_to(Invited));
    }

    #[test]
    fn test_terminal_states() {
        assert!(Completed.is_terminal());
        assert!(Dropped.is_terminal());
        assert!(!Invited.is_terminal());
        assert!(!Started.is_terminal());
    }
}
