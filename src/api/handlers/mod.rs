//! HTTP handlers, grouped by resource.
//!
//! All handlers return `Result<Response, PipelineError>`; the envelope
//! module maps domain errors onto status codes.

pub mod analysis;
pub mod health;
pub mod participants;
pub mod responses;
pub mod studies;
pub mod tasks;

use std::sync::Arc;
use std::time::Instant;

use crate::analysis::AnalysisPipeline;
use crate::ingestor::ResponseIngestor;
use crate::lifecycle::ParticipantLifecycle;
use crate::sequencer::TaskSequencer;
use crate::studies::StudyService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub studies: Arc<StudyService>,
    pub sequencer: Arc<TaskSequencer>,
    pub lifecycle: Arc<ParticipantLifecycle>,
    pub ingestor: Arc<ResponseIngestor>,
    pub pipeline: Arc<AnalysisPipeline>,
    pub started_at: Instant,
}
