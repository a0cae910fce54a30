//! Inference collaborator contract and HTTP backend
//!
//! `InferenceClient` is the pipeline's only seam to the external model
//! provider: one structured-completion call with a schema hint, returning
//! parsed JSON. The production backend speaks the OpenAI-compatible
//! chat-completions wire format over HTTPS with a hard request timeout.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Failure modes of the inference collaborator.
///
/// `Timeout`, `RateLimited` and `Upstream` are transient and retried with
/// backoff; `Auth` is a configuration failure and surfaces immediately;
/// `Malformed` gets exactly one stricter-contract retry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InferenceError {
    #[error("inference request timed out")]
    Timeout,
    #[error("inference authentication failed: {0}")]
    Auth(String),
    #[error("inference rate limited")]
    RateLimited,
    #[error("inference upstream error: {0}")]
    Upstream(String),
    #[error("malformed structured output: {0}")]
    Malformed(String),
}

impl InferenceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited | Self::Upstream(_))
    }
}

/// External inference collaborator.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Complete a prompt into structured JSON guided by `schema_hint`.
    async fn complete_structured(
        &self,
        prompt: &str,
        schema_hint: &str,
    ) -> Result<Value, InferenceError>;

    /// Model identifier baked into analysis fingerprints.
    fn model_version(&self) -> &str;
}

/// OpenAI-compatible HTTP backend.
pub struct HttpInferenceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpInferenceClient {
    /// Build the client. A missing API key is a fatal configuration error
    /// reported on the first call, not something to retry around.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Upstream(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.unwrap_or_default(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn complete_structured(
        &self,
        prompt: &str,
        schema_hint: &str,
    ) -> Result<Value, InferenceError> {
        if self.api_key.is_empty() {
            return Err(InferenceError::Auth("no API key configured".into()));
        }

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": schema_hint},
                {"role": "user", "content": prompt},
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.2,
        });

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout
                } else {
                    InferenceError::Upstream(e.to_string())
                }
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(InferenceError::Auth(format!("provider returned {status}")));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(InferenceError::RateLimited);
        }
        if !status.is_success() {
            return Err(InferenceError::Upstream(format!("provider returned {status}")));
        }

        let envelope: Value = resp
            .json()
            .await
            .map_err(|e| InferenceError::Upstream(e.to_string()))?;

        let content = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| InferenceError::Malformed("no message content in completion".into()))?;

        serde_json::from_str(content)
            .map_err(|e| InferenceError::Malformed(format!("content is not valid JSON: {e}")))
    }

    fn model_version(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_is_auth_error() {
        let client = HttpInferenceClient::new(
            "https://api.example.com/v1",
            None,
            "test-model",
            Duration::from_secs(30),
        )
        .unwrap();

        let err = client.complete_structured("hi", "{}").await.unwrap_err();
        assert!(matches!(err, InferenceError::Auth(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(InferenceError::Timeout.is_transient());
        assert!(InferenceError::RateLimited.is_transient());
        assert!(InferenceError::Upstream("503".into()).is_transient());
        assert!(!InferenceError::Auth("bad key".into()).is_transient());
        assert!(!InferenceError::Malformed("not json".into()).is_transient());
    }
}
