//! Process-wide analysis caches and single-flight locks
//!
//! Micro-analyses are keyed by content fingerprint, so entries can never go
//! stale. The study synthesis cache is keyed by study id and is invalidated
//! only when a new response arrives for that study, never by time alone.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::types::{MicroAnalysis, StudySynthesis};

#[derive(Default)]
pub struct AnalysisCaches {
    micro: DashMap<String, MicroAnalysis>,
    synthesis: DashMap<Uuid, StudySynthesis>,
    micro_flights: DashMap<String, Arc<Mutex<()>>>,
    synthesis_flights: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl AnalysisCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn micro_get(&self, fingerprint: &str) -> Option<MicroAnalysis> {
        self.micro.get(fingerprint).map(|e| e.value().clone())
    }

    pub fn micro_put(&self, analysis: MicroAnalysis) {
        self.micro.insert(analysis.fingerprint.clone(), analysis);
    }

    pub fn synthesis_get(&self, study_id: Uuid) -> Option<StudySynthesis> {
        self.synthesis.get(&study_id).map(|e| e.value().clone())
    }

    pub fn synthesis_put(&self, synthesis: StudySynthesis) {
        self.synthesis.insert(synthesis.study_id, synthesis);
    }

    /// Drop a study's cached synthesis. Called by the ingestor whenever a
    /// new response lands, since that is exactly what makes it stale.
    pub fn invalidate_study(&self, study_id: Uuid) {
        if self.synthesis.remove(&study_id).is_some() {
            tracing::debug!(%study_id, "cached synthesis invalidated");
        }
    }

    /// Per-fingerprint lock collapsing duplicate concurrent micro-analyses.
    pub fn micro_flight(&self, fingerprint: &str) -> Arc<Mutex<()>> {
        self.micro_flights
            .entry(fingerprint.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Per-study lock collapsing duplicate concurrent synthesis requests.
    /// The second caller waits on the first call's result (and its timeout)
    /// instead of issuing its own.
    pub fn synthesis_flight(&self, study_id: Uuid) -> Arc<Mutex<()>> {
        self.synthesis_flights
            .entry(study_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a fingerprint's flight lock once the caller is the last holder.
    /// Call with the caller's clone still alive: strong count 2 means the
    /// map entry plus that clone, so nobody else is waiting.
    pub fn release_micro_flight(&self, fingerprint: &str) {
        self.micro_flights
            .remove_if(fingerprint, |_, lock| Arc::strong_count(lock) <= 2);
    }

    /// Counterpart of [`release_micro_flight`](Self::release_micro_flight)
    /// for the per-study synthesis locks.
    pub fn release_synthesis_flight(&self, study_id: Uuid) {
        self.synthesis_flights
            .remove_if(&study_id, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sentiment, SentimentBreakdown};
    use chrono::Utc;

    fn synthesis(study_id: Uuid) -> StudySynthesis {
        StudySynthesis {
            study_id,
            executive_summary: "fine".into(),
            themes: vec![],
            sentiment_breakdown: SentimentBreakdown::default(),
            recommendations: vec![],
            risks: vec![],
            next_steps: vec![],
            response_count: 1,
            model_version: "test-1".into(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_synthesis_invalidation() {
        let caches = AnalysisCaches::new();
        let study_id = Uuid::new_v4();
        caches.synthesis_put(synthesis(study_id));
        assert!(caches.synthesis_get(study_id).is_some());

        caches.invalidate_study(study_id);
        assert!(caches.synthesis_get(study_id).is_none());
        // Idempotent
        caches.invalidate_study(study_id);
    }

    #[test]
    fn test_micro_keyed_by_fingerprint() {
        let caches = AnalysisCaches::new();
        let analysis = MicroAnalysis {
            response_id: Uuid::new_v4(),
            sentiment: Sentiment::default(),
            themes: vec![],
            key_phrases: vec![],
            emotions: vec![],
            insights: vec![],
            model_version: "test-1".into(),
            fingerprint: "abc".into(),
            generated_at: Utc::now(),
        };
        caches.micro_put(analysis);
        assert!(caches.micro_get("abc").is_some());
        assert!(caches.micro_get("def").is_none());
    }

    #[test]
    fn test_flight_lock_is_shared_per_key() {
        let caches = AnalysisCaches::new();
        let id = Uuid::new_v4();
        let a = caches.synthesis_flight(id);
        let b = caches.synthesis_flight(id);
        assert!(Arc::ptr_eq(&a, &b));
        let other = caches.synthesis_flight(Uuid::new_v4());
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn test_flight_lock_released_when_last_holder_leaves() {
        let caches = AnalysisCaches::new();
        let id = Uuid::new_v4();

        let lock = caches.synthesis_flight(id);
        caches.release_synthesis_flight(id);
        assert!(caches.synthesis_flights.is_empty());
        drop(lock);

        let flight = caches.micro_flight("abc");
        caches.release_micro_flight("abc");
        assert!(caches.micro_flights.is_empty());
        drop(flight);
    }

    #[test]
    fn test_flight_lock_survives_while_another_caller_waits() {
        let caches = AnalysisCaches::new();
        let id = Uuid::new_v4();

        let first = caches.synthesis_flight(id);
        let second = caches.synthesis_flight(id);
        caches.release_synthesis_flight(id);
        assert_eq!(caches.synthesis_flights.len(), 1);

        drop(first);
        caches.release_synthesis_flight(id);
        assert!(caches.synthesis_flights.is_empty());
        drop(second);
    }
}
