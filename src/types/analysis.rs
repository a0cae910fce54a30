//! Derived analysis artifacts
//!
//! Both shapes are regenerable from responses at any time and never
//! hand-edited. `fingerprint` ties a micro-analysis to the exact input it
//! was derived from so the pipeline can skip duplicate inference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentiment classification with model confidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sentiment {
    /// -1.0 (negative) to 1.0 (positive)
    pub score: f64,
    /// "positive" | "neutral" | "negative"
    pub label: String,
    /// 0.0 to 1.0
    pub confidence: f64,
}

impl Default for Sentiment {
    fn default() -> Self {
        Self { score: 0.0, label: "neutral".to_string(), confidence: 0.0 }
    }
}

/// Per-response micro-analysis produced by the inference collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroAnalysis {
    pub response_id: Uuid,
    pub sentiment: Sentiment,
    pub themes: Vec<String>,
    pub key_phrases: Vec<String>,
    pub emotions: Vec<String>,
    pub insights: Vec<String>,
    pub model_version: String,
    /// md5 of (analysis text, model version); the at-most-once cache key.
    pub fingerprint: String,
    pub generated_at: DateTime<Utc>,
}

/// One recurring theme across a study's responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeSummary {
    pub name: String,
    /// How many responses touched this theme.
    pub frequency: u32,
    /// "positive" | "neutral" | "negative" | "mixed"
    pub sentiment: String,
    pub examples: Vec<String>,
}

/// Prioritized recommendation from the study synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// 1 = highest priority.
    pub priority: u32,
    pub action: String,
    pub rationale: String,
}

/// Share of responses per sentiment bucket; fractions sum to ~1.0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

/// Whole-study macro-synthesis over completed participants' responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySynthesis {
    pub study_id: Uuid,
    pub executive_summary: String,
    pub themes: Vec<ThemeSummary>,
    pub sentiment_breakdown: SentimentBreakdown,
    pub recommendations: Vec<Recommendation>,
    pub risks: Vec<String>,
    pub next_steps: Vec<String>,
    /// Number of responses the synthesis was derived from.
    pub response_count: usize,
    pub model_version: String,
    pub generated_at: DateTime<Utc>,
}
