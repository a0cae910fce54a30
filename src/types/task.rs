//! Task: one unit of work a participant performs, typed by interaction modality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of task interaction modalities. Unknown values are rejected at
/// the deserialization boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Photo or video capture
    Camera,
    /// Free-text discussion prompt
    Discussion,
    /// Curated image gallery upload
    Gallery,
    /// Image collage assembly
    Collage,
    /// Ranked classification of items
    Classification,
    /// Fill-in-the-blanks completion
    FillBlanks,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        TaskType::Camera,
        TaskType::Discussion,
        TaskType::Gallery,
        TaskType::Collage,
        TaskType::Classification,
        TaskType::FillBlanks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Camera => "camera",
            TaskType::Discussion => "discussion",
            TaskType::Gallery => "gallery",
            TaskType::Collage => "collage",
            TaskType::Classification => "classification",
            TaskType::FillBlanks => "fill_blanks",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A task within a study. `order_index` is study-scoped, strictly increasing
/// and unique; the sequencer owns all writes to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub study_id: Uuid,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub order_index: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for creating a task. When `order_index` is omitted
/// the sequencer appends after the study's current maximum.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub study_id: Uuid,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub title: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub order_index: Option<u32>,
}

/// Patchable task fields. Ordering changes go through `reorder`, not here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default, rename = "type")]
    pub task_type: Option<TaskType>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_round_trip() {
        for t in TaskType::ALL {
            let v = serde_json::to_value(t).unwrap();
            assert_eq!(v, serde_json::json!(t.as_str()));
        }
    }

    #[test]
    fn test_invalid_task_type_rejected() {
        let r: Result<TaskType, _> = serde_json::from_value(serde_json::json!("survey"));
        assert!(r.is_err());
    }

    #[test]
    fn test_fill_blanks_wire_name() {
        assert_eq!(TaskType::FillBlanks.as_str(), "fill_blanks");
    }
}
