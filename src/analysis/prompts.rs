//! Prompt templates for the inference collaborator
//!
//! Templates use `{placeholder}` substitution. Each call pairs a prompt
//! with a schema hint (the system message) describing the exact JSON shape
//! expected back; the `STRICT_CONTRACT` suffix is appended on the one retry
//! after malformed output.

/// Schema hint for per-response micro-analysis.
pub const RESPONSE_SCHEMA_HINT: &str = r#"You analyze consumer research responses.
Reply with a single JSON object, nothing else:
{
  "sentiment": {"score": <float -1.0..1.0>, "label": "positive|neutral|negative", "confidence": <float 0..1>},
  "themes": [<strings>],
  "key_phrases": [<strings>],
  "emotions": [<strings>],
  "insights": [<strings>]
}"#;

/// Micro-analysis prompt.
pub const RESPONSE_ANALYSIS_PROMPT: &str = r#"Analyze this consumer research response.

### STUDY
{study_name}

### TASK
Type: {task_type}
Title: {task_title}

### RESPONSE
{response_text}

Assess sentiment, recurring themes, key phrases, expressed emotions, and
any actionable insights. Output ONLY the JSON object described by the system
message."#;

/// Schema hint for whole-study synthesis.
pub const SYNTHESIS_SCHEMA_HINT: &str = r#"You synthesize consumer research studies.
Reply with a single JSON object, nothing else:
{
  "executive_summary": <string>,
  "themes": [{"name": <string>, "frequency": <int>, "sentiment": "positive|neutral|negative|mixed", "examples": [<strings>]}],
  "sentiment_breakdown": {"positive": <float>, "neutral": <float>, "negative": <float>},
  "recommendations": [{"priority": <int, 1 = highest>, "action": <string>, "rationale": <string>}],
  "risks": [<strings>],
  "next_steps": [<strings>]
}"#;

/// Study synthesis prompt.
pub const SYNTHESIS_PROMPT: &str = r#"Synthesize the findings of this consumer research study.

### STUDY
Name: {study_name}
Objective: {objective}
Completed participants: {participant_count}
Responses: {response_count}

### RESPONSES
{response_block}

Produce an executive summary, the recurring themes with frequency and
sentiment, an overall sentiment breakdown, prioritized recommendations,
risks, and next steps. Output ONLY the JSON object described by the system
message."#;

/// Appended to the schema hint on the single retry after malformed output.
pub const STRICT_CONTRACT: &str = "\n\nIMPORTANT: your previous output could not be parsed. \
Return EXACTLY one JSON object conforming to the schema above. No prose, no \
markdown fences, no trailing text.";

/// Substitute `{name}` placeholders.
pub fn fill(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in pairs {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}
