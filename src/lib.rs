//! InsightPipe: study execution pipeline for consumer research.
//!
//! ## Architecture
//!
//! - **Studies**: research study CRUD with cascading deletes
//! - **Sequencer**: ordered task management with atomic reordering
//! - **Lifecycle**: participant enrollment and status state machine
//! - **Ingestor**: validated, idempotent response submission
//! - **Analysis**: LLM-backed per-response analysis and study synthesis
//!   with fingerprint caching, single-flight, and bounded retry
//! - **Repository**: pluggable persistence (sled on disk, in-memory for tests)

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod ingestor;
pub mod lifecycle;
pub mod repository;
pub mod sequencer;
pub mod studies;
pub mod types;

pub use analysis::{AnalysisCaches, AnalysisPipeline, HttpInferenceClient, InferenceClient};
pub use config::Config;
pub use error::{PipelineError, PipelineResult};
pub use ingestor::ResponseIngestor;
pub use lifecycle::ParticipantLifecycle;
pub use repository::{MemoryRepository, Repository, SledRepository};
pub use sequencer::TaskSequencer;
pub use studies::StudyService;
