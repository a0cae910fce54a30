//! Shared data structures for the study execution pipeline
//!
//! This module defines the entities the pipeline moves between components:
//! - Study (owner of the ordered task sequence and the participant roster)
//! - Task (one unit of participant work, typed by interaction modality)
//! - Participant (lifecycle state machine through a study)
//! - Response (a participant's answer to one task, typed payload)
//! - MicroAnalysis / StudySynthesis (derived artifacts, never authoritative)

mod analysis;
mod participant;
mod response;
mod study;
mod task;

pub use analysis::*;
pub use participant::*;
pub use response::*;
pub use study::*;
pub use task::*;
