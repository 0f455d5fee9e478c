use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PipelineError, Result};

/// A single structured-output call: a prompt plus a JSON Schema the model
/// must conform its response to, returning the parsed JSON value.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_structured(
        &self,
        prompt: &str,
        response_schema: &Value,
        temperature: f64,
        max_output_tokens: u32,
    ) -> Result<Value>;

    async fn generate_text(&self, prompt: &str, temperature: f64) -> Result<String>;
}

/// Talks to the Gemini text-generation HTTP API, used for content
/// classification and script drafting. Shares the retry-free, single-call
/// shape of the TTS client's HTTP plumbing but without rate limiting or
/// audio-specific response handling.
pub struct GeminiLlmClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    call_timeout: Duration,
}

impl GeminiLlmClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, call_timeout: Duration) -> Self {
        GeminiLlmClient {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: model.into(),
            call_timeout,
        }
    }

    async fn call(&self, body: Value) -> Result<Value> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        );

        let response = tokio::time::timeout(self.call_timeout, self.client.post(&url).json(&body).send())
            .await
            .map_err(|_| PipelineError::transient_local("LLM call timed out"))??;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &text));
        }

        let parsed: Value = serde_json::from_str(&text).map_err(PipelineError::from)?;
        Ok(parsed)
    }

    fn extract_text(parsed: &Value) -> Result<String> {
        parsed
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| PipelineError::fatal_external("no text in LLM response"))
    }
}

fn classify_error(status: u16, body: &str) -> PipelineError {
    if status == 429 {
        return PipelineError::deferrable(format!("LLM rate limited: {}", body));
    }
    if (500..600).contains(&status) {
        return PipelineError::transient_local(format!("LLM service error {}: {}", status, body));
    }
    PipelineError::fatal_external(format!("LLM request rejected {}: {}", status, body))
}

#[async_trait]
impl LlmClient for GeminiLlmClient {
    async fn generate_structured(
        &self,
        prompt: &str,
        response_schema: &Value,
        temperature: f64,
        max_output_tokens: u32,
    ) -> Result<Value> {
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_output_tokens,
                "responseMimeType": "application/json",
                "responseSchema": response_schema,
            },
        });

        let parsed = self.call(body).await?;
        let text = Self::extract_text(&parsed)?;
        serde_json::from_str(&text).map_err(PipelineError::from)
    }

    async fn generate_text(&self, prompt: &str, temperature: f64) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }],
            "generationConfig": {
                "temperature": temperature,
            },
        });

        let parsed = self.call(body).await?;
        Self::extract_text(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_text_reads_first_candidate_part() {
        let parsed = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "hello" }] }
            }]
        });
        assert_eq!(GeminiLlmClient::extract_text(&parsed).unwrap(), "hello");
    }

    #[test]
    fn extract_text_errs_on_missing_candidates() {
        let parsed = serde_json::json!({ "candidates": [] });
        assert!(GeminiLlmClient::extract_text(&parsed).is_err());
    }

    #[test]
    fn classify_error_maps_429_to_deferrable() {
        let err = classify_error(429, "slow down");
        assert!(err.deferrable_kind());
    }
}
