//! Domain error type shared across the pipeline.
//!
//! Variants correspond one-to-one with the API error codes; the envelope
//! module owns the mapping to HTTP status codes.

use thiserror::Error;
use uuid::Uuid;

use crate::repository::RepositoryError;
use crate::types::ParticipantStatus;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("invalid payload for task {task_id}: {reason}")]
    InvalidPayload { task_id: Uuid, reason: String },

    #[error("participant {participant_id} cannot move from {from} to {to}")]
    InvalidTransition {
        participant_id: Uuid,
        from: ParticipantStatus,
        to: ParticipantStatus,
    },

    #[error("{0}")]
    InvalidState(String),

    #[error("external service failure: {0}")]
    ExternalService(String),

    #[error("study {study_id} has too few responses for synthesis")]
    InsufficientData { study_id: Uuid },

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl PipelineError {
    /// Stable machine-readable code carried in the API error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InvalidPayload { .. } => "INVALID_PAYLOAD",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
