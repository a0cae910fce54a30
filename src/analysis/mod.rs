//! AnalysisPipeline — AI-assisted insight generation
//!
//! Two operations over the inference collaborator:
//! - `analyze_response`: per-response micro-analysis, cached by a
//!   fingerprint of (response content, model version) so byte-identical
//!   input never pays for a second inference
//! - `synthesize_study`: whole-study macro-synthesis over completed
//!   participants' responses, single-flighted per study
//!
//! Failure handling: transient collaborator failures (timeout, rate limit,
//! 5xx) retry with bounded exponential backoff; auth/configuration failures
//! surface immediately; malformed structured output gets exactly one retry
//! under a stricter contract before the operation fails.

mod cache;
mod inference;
mod parse;
mod prompts;

pub use cache::AnalysisCaches;
pub use inference::{HttpInferenceClient, InferenceClient, InferenceError};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::repository::{decode, Filter, Repository, Table};
use crate::studies::load_study;
use crate::types::{
    MicroAnalysis, Participant, ParticipantStatus, Response, Study, StudySynthesis, Task,
};

/// Retry and threshold knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Attempts per call for transient failures.
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt.
    pub backoff_base: Duration,
    /// Minimum eligible responses before synthesis calls the collaborator.
    pub min_responses: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { max_attempts: 3, backoff_base: Duration::from_millis(250), min_responses: 1 }
    }
}

/// Counters exposed on the health endpoint.
#[derive(Debug, Default)]
struct PipelineStats {
    inference_calls: AtomicU64,
    cache_hits: AtomicU64,
    strict_retries: AtomicU64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisStats {
    pub inference_calls: u64,
    pub cache_hits: u64,
    pub strict_retries: u64,
}

pub struct AnalysisPipeline {
    repo: Arc<dyn Repository>,
    client: Arc<dyn InferenceClient>,
    caches: Arc<AnalysisCaches>,
    config: AnalysisConfig,
    stats: PipelineStats,
}

impl AnalysisPipeline {
    pub fn new(
        repo: Arc<dyn Repository>,
        client: Arc<dyn InferenceClient>,
        caches: Arc<AnalysisCaches>,
        config: AnalysisConfig,
    ) -> Self {
        Self { repo, client, caches, config, stats: PipelineStats::default() }
    }

    pub fn stats(&self) -> AnalysisStats {
        AnalysisStats {
            inference_calls: self.stats.inference_calls.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            strict_retries: self.stats.strict_retries.load(Ordering::Relaxed),
        }
    }

    fn fingerprint(&self, analysis_text: &str) -> String {
        let digest = md5::compute(format!("{analysis_text}\n{}", self.client.model_version()));
        format!("{digest:x}")
    }

    /// One collaborator call with bounded exponential backoff on transient
    /// failures. Auth and malformed output are returned to the caller
    /// untouched for their own handling.
    async fn call_with_retry(
        &self,
        prompt: &str,
        schema_hint: &str,
    ) -> Result<Value, InferenceError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.stats.inference_calls.fetch_add(1, Ordering::Relaxed);
            match self.client.complete_structured(prompt, schema_hint).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff_base * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64,
                        "transient inference failure, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Call, parse, and on malformed output retry once with the strict
    /// contract appended to the schema hint.
    async fn structured_call<T>(
        &self,
        prompt: &str,
        schema_hint: &str,
        parse: impl Fn(&Value) -> Result<T, String>,
    ) -> PipelineResult<T> {
        let first = self.call_with_retry(prompt, schema_hint).await;

        let malformed_reason = match first {
            Ok(value) => match parse(&value) {
                Ok(artifact) => return Ok(artifact),
                Err(reason) => reason,
            },
            Err(InferenceError::Malformed(reason)) => reason,
            Err(e) => return Err(PipelineError::ExternalService(e.to_string())),
        };

        tracing::warn!(reason = %malformed_reason, "malformed output, retrying with strict contract");
        self.stats.strict_retries.fetch_add(1, Ordering::Relaxed);

        let strict_hint = format!("{schema_hint}{}", prompts::STRICT_CONTRACT);
        let value = self
            .call_with_retry(prompt, &strict_hint)
            .await
            .map_err(|e| PipelineError::ExternalService(e.to_string()))?;
        parse(&value).map_err(|reason| {
            PipelineError::ExternalService(format!("analysis failed: {reason} after strict retry"))
        })
    }

    async fn load_response(&self, response_id: Uuid) -> PipelineResult<Response> {
        let rows = self.repo.read(Table::Responses, &Filter::by_id(response_id)).await?;
        decode::<Response>(rows)?
            .into_iter()
            .next()
            .ok_or(PipelineError::NotFound { entity: "response", id: response_id })
    }

    async fn load_task(&self, task_id: Uuid) -> PipelineResult<Task> {
        let rows = self.repo.read(Table::Tasks, &Filter::by_id(task_id)).await?;
        decode::<Task>(rows)?
            .into_iter()
            .next()
            .ok_or(PipelineError::NotFound { entity: "task", id: task_id })
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

    /// Look up a previously stored micro-analysis by fingerprint, so a
    /// restart does not re-bill for content already analyzed.
    async fn stored_micro(&self, fingerprint: &str) -> PipelineResult<Option<MicroAnalysis>> {
        let rows = self
            .repo
            .read(
                Table::Analyses,
                &Filter::new().eq("kind", "micro").eq("fingerprint", fingerprint),
            )
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| serde_json::from_value(row["artifact"].clone()).ok()))
    }

    /// Micro-analyze one response.
    ///
    /// At most one collaborator call per unique (content, model version):
    /// the in-memory fingerprint cache and the stored artifact are both
    /// consulted, under a per-fingerprint flight lock, before any inference.
    pub async fn analyze_response(&self, response_id: Uuid) -> PipelineResult<MicroAnalysis> {
        let response = self.load_response(response_id).await?;
        let task = self.load_task(response.task_id).await?;
        let participant = self.load_participant(response.participant_id).await?;
        let study = load_study(self.repo.as_ref(), participant.study_id).await?;

        let analysis_text = response.response_data.as_analysis_text();
        let fingerprint = self.fingerprint(&analysis_text);

        if let Some(hit) = self.caches.micro_get(&fingerprint) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%response_id, fingerprint = %fingerprint, "micro-analysis cache hit");
            return Ok(hit);
        }

        let flight = self.caches.micro_flight(&fingerprint);
        let guard = flight.lock().await;
        let outcome = self
            .run_micro_analysis(&study, &task, response_id, &fingerprint, &analysis_text)
            .await;
        drop(guard);
        // `flight` is still alive here, so the lock entry only goes away
        // when no other caller holds a clone.
        self.caches.release_micro_flight(&fingerprint);
        outcome
    }

    async fn run_micro_analysis(
        &self,
        study: &Study,
        task: &Task,
        response_id: Uuid,
        fingerprint: &str,
        analysis_text: &str,
    ) -> PipelineResult<MicroAnalysis> {
        // A concurrent caller may have landed the artifact while we waited.
        if let Some(hit) = self.caches.micro_get(fingerprint) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        if let Some(stored) = self.stored_micro(fingerprint).await? {
            self.caches.micro_put(stored.clone());
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(stored);
        }

        let prompt = prompts::fill(
            prompts::RESPONSE_ANALYSIS_PROMPT,
            &[
                ("study_name", study.name.as_str()),
                ("task_type", task.task_type.as_str()),
                ("task_title", task.title.as_str()),
                ("response_text", analysis_text),
            ],
        );

        let model_version = self.client.model_version().to_string();
        let analysis = self
            .structured_call(&prompt, prompts::RESPONSE_SCHEMA_HINT, |value| {
                parse::parse_micro(response_id, fingerprint, &model_version, value)
            })
            .await?;

        let row = json!({
            "id": Uuid::new_v4().to_string(),
            "kind": "micro",
            "fingerprint": fingerprint,
            "response_id": response_id,
            "artifact": analysis,
        });
        self.repo.create(Table::Analyses, row).await?;
        self.caches.micro_put(analysis.clone());

        tracing::info!(%response_id, sentiment = %analysis.sentiment.label, "response analyzed");
        Ok(analysis)
    }

    /// Synthesize a study from its completed participants' responses.
    ///
    /// Concurrent calls for the same study collapse into one collaborator
    /// call; later callers receive the cached artifact. The cache lives
    /// until a new response for the study invalidates it.
    pub async fn synthesize_study(&self, study_id: Uuid) -> PipelineResult<StudySynthesis> {
        let study = load_study(self.repo.as_ref(), study_id).await?;

        let flight = self.caches.synthesis_flight(study_id);
        let guard = flight.lock().await;
        let outcome = self.run_synthesis(&study).await;
        drop(guard);
        self.caches.release_synthesis_flight(study_id);
        outcome
    }

    async fn run_synthesis(&self, study: &Study) -> PipelineResult<StudySynthesis> {
        let study_id = study.id;

        if let Some(hit) = self.caches.synthesis_get(study_id) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%study_id, "synthesis cache hit");
            return Ok(hit);
        }

        let completed = self
            .repo
            .read(
                Table::Participants,
                &Filter::new()
                    .eq("study_id", study_id)
                    .eq("status", ParticipantStatus::Completed),
            )
            .await?;
        let completed: Vec<Participant> = decode(completed)?;

        let mut lines = Vec::new();
        for participant in &completed {
            let rows = self
                .repo
                .read(Table::Responses, &Filter::new().eq("participant_id", participant.id))
                .await?;
            for response in decode::<Response>(rows)? {
                let task = self.load_task(response.task_id).await?;
                lines.push(format!(
                    "- [{} / {}] {}",
                    task.task_type,
                    task.title,
                    response.response_data.as_analysis_text()
                ));
            }
        }

        if lines.len() < self.config.min_responses {
            tracing::info!(%study_id, responses = lines.len(),
                threshold = self.config.min_responses, "synthesis skipped: insufficient data");
            return Err(PipelineError::InsufficientData { study_id });
        }

        let response_count = lines.len();
        let prompt = prompts::fill(
            prompts::SYNTHESIS_PROMPT,
            &[
                ("study_name", study.name.as_str()),
                ("objective", study.objective.as_deref().unwrap_or("not stated")),
                ("participant_count", completed.len().to_string().as_str()),
                ("response_count", response_count.to_string().as_str()),
                ("response_block", lines.join("\n").as_str()),
            ],
        );

        let model_version = self.client.model_version().to_string();
        let synthesis = self
            .structured_call(&prompt, prompts::SYNTHESIS_SCHEMA_HINT, |value| {
                parse::parse_synthesis(study_id, &model_version, response_count, value)
            })
            .await?;

        self.caches.synthesis_put(synthesis.clone());

        tracing::info!(%study_id, response_count, themes = synthesis.themes.len(),
            "study synthesized");
        Ok(synthesis)
    }

    /// Cached synthesis read-back without triggering inference.
    pub fn cached_synthesis(&self, study_id: Uuid) -> Option<StudySynthesis> {
        self.caches.synthesis_get(study_id)
    }
}
