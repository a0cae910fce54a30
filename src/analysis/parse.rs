//! Parsing of collaborator JSON into analysis artifacts
//!
//! Required fields (sentiment score/label, executive summary) failing to
//! parse count as malformed output and trigger the strict-contract retry;
//! optional list fields default to empty rather than failing the artifact.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::types::{
    MicroAnalysis, Recommendation, Sentiment, SentimentBreakdown, StudySynthesis, ThemeSummary,
};

fn string_list(value: &Value, field: &str) -> Vec<String> {
    value[field]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a micro-analysis payload. `Err` carries the reason and is treated
/// as malformed output.
pub fn parse_micro(
    response_id: Uuid,
    fingerprint: &str,
    model_version: &str,
    value: &Value,
) -> Result<MicroAnalysis, String> {
    let sentiment = &value["sentiment"];
    let score = sentiment["score"]
        .as_f64()
        .ok_or("missing sentiment.score")?;
    if !(-1.0..=1.0).contains(&score) {
        return Err(format!("sentiment.score {score} outside [-1, 1]"));
    }
    let label = sentiment["label"]
        .as_str()
        .ok_or("missing sentiment.label")?
        .to_string();
    let confidence = sentiment["confidence"].as_f64().unwrap_or(0.0).clamp(0.0, 1.0);

    Ok(MicroAnalysis {
        response_id,
        sentiment: Sentiment { score, label, confidence },
        themes: string_list(value, "themes"),
        key_phrases: string_list(value, "key_phrases"),
        emotions: string_list(value, "emotions"),
        insights: string_list(value, "insights"),
        model_version: model_version.to_string(),
        fingerprint: fingerprint.to_string(),
        generated_at: Utc::now(),
    })
}

/// Parse a study synthesis payload. Recommendations keep the collaborator's
/// priority when present; otherwise position order (1-based) is assigned so
/// the priority ordering stays meaningful.
pub fn parse_synthesis(
    study_id: Uuid,
    model_version: &str,
    response_count: usize,
    value: &Value,
) -> Result<StudySynthesis, String> {
    let executive_summary = value["executive_summary"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or("missing executive_summary")?
        .to_string();

    let themes = value["themes"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|t| {
                    Some(ThemeSummary {
                        name: t["name"].as_str()?.to_string(),
                        frequency: t["frequency"].as_u64().unwrap_or(1) as u32,
                        sentiment: t["sentiment"].as_str().unwrap_or("mixed").to_string(),
                        examples: string_list(t, "examples"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let breakdown = &value["sentiment_breakdown"];
    let sentiment_breakdown = SentimentBreakdown {
        positive: breakdown["positive"].as_f64().unwrap_or(0.0),
        neutral: breakdown["neutral"].as_f64().unwrap_or(0.0),
        negative: breakdown["negative"].as_f64().unwrap_or(0.0),
    };

    let recommendations = value["recommendations"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(i, r)| {
                    Some(Recommendation {
                        priority: r["priority"].as_u64().unwrap_or(i as u64 + 1) as u32,
                        action: r["action"].as_str()?.to_string(),
                        rationale: r["rationale"].as_str().unwrap_or_default().to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(StudySynthesis {
        study_id,
        executive_summary,
        themes,
        sentiment_breakdown,
        recommendations,
        risks: string_list(value, "risks"),
        next_steps: string_list(value, "next_steps"),
        response_count,
        model_version: model_version.to_string(),
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_micro_full_shape() {
        let value = json!({
            "sentiment": {"score": 0.7, "label": "positive", "confidence": 0.9},
            "themes": ["convenience"],
            "key_phrases": ["easy to open"],
            "emotions": ["delight"],
            "insights": ["packaging drives repurchase"]
        });
        let a = parse_micro(Uuid::new_v4(), "fp", "m1", &value).unwrap();
        assert_eq!(a.sentiment.label, "positive");
        assert_eq!(a.themes, vec!["convenience"]);
        assert_eq!(a.fingerprint, "fp");
    }

    #[test]
    fn test_parse_micro_missing_sentiment_is_malformed() {
        let value = json!({"themes": ["x"]});
        assert!(parse_micro(Uuid::new_v4(), "fp", "m1", &value).is_err());
    }

    #[test]
    fn test_parse_micro_out_of_range_score_rejected() {
        let value = json!({"sentiment": {"score": 3.0, "label": "positive"}});
        assert!(parse_micro(Uuid::new_v4(), "fp", "m1", &value).is_err());
    }

    #[test]
    fn test_parse_micro_optional_lists_default_empty() {
        let value = json!({"sentiment": {"score": 0.0, "label": "neutral"}});
        let a = parse_micro(Uuid::new_v4(), "fp", "m1", &value).unwrap();
        assert!(a.themes.is_empty());
        assert!(a.insights.is_empty());
        assert_eq!(a.sentiment.confidence, 0.0);
    }

    #[test]
    fn test_parse_synthesis_assigns_positional_priority() {
        let value = json!({
            "executive_summary": "Overall positive reception.",
            "recommendations": [
                {"action": "first"},
                {"action": "second"}
            ]
        });
        let s = parse_synthesis(Uuid::new_v4(), "m1", 4, &value).unwrap();
        assert_eq!(s.recommendations[0].priority, 1);
        assert_eq!(s.recommendations[1].priority, 2);
        assert_eq!(s.response_count, 4);
    }

    #[test]
    fn test_parse_synthesis_requires_summary() {
        let value = json!({"themes": []});
        assert!(parse_synthesis(Uuid::new_v4(), "m1", 1, &value).is_err());
        let value = json!({"executive_summary": "   "});
        assert!(parse_synthesis(Uuid::new_v4(), "m1", 1, &value).is_err());
    }
}
