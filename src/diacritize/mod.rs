use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{PipelineError, Result};

/// Abstraction over the external Hebrew niqqud (diacritization) service.
/// Only Hebrew text passes through here; callers are responsible for the
/// language/script checks before invoking it.
#[async_trait]
pub trait DiacritizationClient: Send + Sync {
    async fn diacritize(&self, text: &str) -> Result<String>;
}

const MAX_CHUNK_LEN: usize = 10_000;

fn is_hebrew_text(text: &str) -> bool {
    text.chars().any(|c| ('\u{0590}'..='\u{05FF}').contains(&c))
}

fn strip_niqqud(text: &str) -> String {
    text.chars()
        .filter(|c| !(('\u{05B0}'..='\u{05BC}').contains(c) || *c == '\u{05C1}' || *c == '\u{05C2}'))
        .collect()
}

/// Splits `text` into chunks no longer than `max_len`, breaking on the last
/// preceding space so words aren't cut mid-token.
fn split_by_length(text: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + max_len).min(chars.len());
        let mut split_at = end;
        if end < chars.len() {
            if let Some(space_offset) = chars[start..end].iter().rposition(|&c| c == ' ') {
                split_at = start + space_offset + 1;
            }
        }
        let chunk: String = chars[start..split_at].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        start = split_at.max(start + 1);
    }
    chunks
}

#[derive(Debug, Deserialize)]
struct DictaWordOption(String, #[serde(default)] serde_json::Value);

#[derive(Debug, Deserialize)]
struct DictaWord {
    #[serde(default)]
    options: Vec<Vec<DictaWordOption>>,
    #[serde(default)]
    word: String,
}

fn extract_word(word: &DictaWord) -> String {
    if let Some(option) = word.options.first().and_then(|opts| opts.first()) {
        return option.0.replace('|', "");
    }
    word.word.clone()
}

/// Talks to the Dicta Nakdan API, which vocalizes (adds niqqud to) Hebrew
/// text one word at a time. Text is split into sub-10k-character chunks on
/// word boundaries before each request, then rejoined.
pub struct DictaDiacritizationClient {
    client: reqwest::Client,
    endpoint: String,
    call_timeout: Duration,
}

impl DictaDiacritizationClient {
    pub fn new(call_timeout: Duration) -> Self {
        DictaDiacritizationClient {
            client: reqwest::Client::new(),
            endpoint: "https://nakdan-2-0.loadbalancer.dicta.org.il/api".to_string(),
            call_timeout,
        }
    }

    async fn fetch_chunk(&self, text: &str) -> Result<String> {
        let body = json!({
            "task": "nakdan",
            "genre": "modern",
            "data": text,
            "addmorph": true,
            "keepqq": false,
            "nodageshdefmem": false,
            "patachma": false,
            "keepmetagim": true,
        });

        let response = tokio::time::timeout(
            self.call_timeout,
            self.client
                .post(&self.endpoint)
                .header("content-type", "text/plain;charset=UTF-8")
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| PipelineError::transient_local("diacritization call timed out"))??;

        if !response.status().is_success() {
            return Err(PipelineError::transient_local(format!(
                "diacritization service returned {}",
                response.status()
            )));
        }

        let words: Vec<DictaWord> = response.json().await?;
        let result: String = words.iter().map(extract_word).collect();

        if strip_niqqud(&result).chars().count() as f64 * 1.2 > result.chars().count() as f64 {
            return Err(PipelineError::transient_local(
                "diacritization response carried insufficient niqqud",
            ));
        }

        Ok(result)
    }
}

#[async_trait]
impl DiacritizationClient for DictaDiacritizationClient {
    async fn diacritize(&self, text: &str) -> Result<String> {
        let mut parts = Vec::new();
        for chunk in split_by_length(text, MAX_CHUNK_LEN) {
            parts.push(self.fetch_chunk(&chunk).await?);
        }
        Ok(parts.join(" "))
    }
}

/// Applies Hebrew diacritization only when the language is Hebrew and the
/// script actually contains Hebrew characters; falls back silently to the
/// original text on any client error, mirroring the source system's
/// best-effort niqqud pass.
pub async fn process_script_for_tts(
    client: &dyn DiacritizationClient,
    script: &str,
    language: &str,
) -> String {
    let language_lower = language.to_lowercase();
    if !["he", "hebrew", "heb"].contains(&language_lower.as_str()) {
        return script.to_string();
    }
    if !is_hebrew_text(script) {
        return script.to_string();
    }

    match client.diacritize(script).await {
        Ok(processed) => processed,
        Err(err) => {
            tracing::warn!(error = %err, "diacritization failed, falling back to original script");
            script.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubClient(String);

    #[async_trait]
    impl DiacritizationClient for StubClient {
        async fn diacritize(&self, _text: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingClient;

    #[async_trait]
    impl DiacritizationClient for FailingClient {
        async fn diacritize(&self, _text: &str) -> Result<String> {
            Err(PipelineError::transient_local("down"))
        }
    }

    #[tokio::test]
    async fn non_hebrew_language_skips_processing() {
        let client = StubClient("should not appear".to_string());
        let result = process_script_for_tts(&client, "Host: hello there", "english").await;
        assert_eq!(result, "Host: hello there");
    }

    #[tokio::test]
    async fn hebrew_text_is_processed() {
        let client = StubClient("מְעֻבָּד".to_string());
        let result = process_script_for_tts(&client, "שלום", "hebrew").await;
        assert_eq!(result, "מְעֻבָּד");
    }

    #[tokio::test]
    async fn client_failure_falls_back_to_original() {
        let result = process_script_for_tts(&FailingClient, "שלום עולם", "he").await;
        assert_eq!(result, "שלום עולם");
    }

    #[test]
    fn split_by_length_breaks_on_word_boundary() {
        let text = "aaaa bbbb cccc dddd";
        let chunks = split_by_length(text, 10);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn is_hebrew_text_detects_hebrew_block() {
        assert!(is_hebrew_text("שלום"));
        assert!(!is_hebrew_text("hello"));
    }
}
