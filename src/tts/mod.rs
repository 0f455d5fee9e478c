pub mod rate_limiter;

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chunk::wav;
use crate::domain::SpeakerGender;
use crate::error::{PipelineError, Result};
use crate::voice::SpeechStyle;

pub use rate_limiter::{parse_retry_delay, TtsRateLimiter};

/// One speaker's resolved voice for a multi-speaker synthesis call.
#[derive(Debug, Clone)]
pub struct SpeakerVoice {
    pub role: String,
    pub gender: SpeakerGender,
    pub voice: String,
}

/// Everything needed to synthesize one chunk of script text.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub style: SpeechStyle,
    pub speaker1: SpeakerVoice,
    pub speaker2: Option<SpeakerVoice>,
}

/// Abstraction over the remote multi-speaker TTS service. Implementations
/// must fail fast (`Validation`) rather than silently proceeding when a
/// required voice selection is missing — the source system's
/// silent-reselection fallback is not reproduced here (see DESIGN.md).
#[async_trait]
pub trait TtsClient: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;
}

const MODEL: &str = "gemini-2.5-pro-preview-tts";
const TEMPERATURE: f64 = 0.8;
const MAX_RETRIES: u32 = 2;
const BACKOFF_SCHEDULE_SECONDS: [u64; 3] = [5, 10, 20];

/// Talks to the Gemini-style multi-speaker TTS HTTP API. Applies the
/// process-wide rate limiter, a per-call timeout, and up to
/// `MAX_RETRIES` retries with exponential backoff (5s/10s/20s) applied
/// uniformly across single- and multi-speaker requests.
pub struct GeminiTtsClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    call_timeout: Duration,
    rate_limiter: TtsRateLimiter,
}

impl GeminiTtsClient {
    pub fn new(api_key: impl Into<String>, call_timeout: Duration, requests_per_minute: u32) -> Self {
        GeminiTtsClient {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            call_timeout,
            rate_limiter: TtsRateLimiter::new(requests_per_minute),
        }
    }

    async fn call_once(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        self.rate_limiter.acquire().await;

        let mut prompt = format!(
            "{}\n\n{}",
            request.style.style_instruction, request.text
        );
        if request.style.bcp47.starts_with("he") {
            prompt = format!(
                "IMPORTANT: Read this conversation in Hebrew. Speak naturally with proper pronunciation.\n\n{}",
                prompt
            );
        }

        let speaker_voice_configs = match &request.speaker2 {
            Some(speaker2) => vec![
                speaker_voice_config(&request.speaker1),
                speaker_voice_config(speaker2),
            ],
            None => vec![speaker_voice_config(&request.speaker1)],
        };

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "multiSpeakerVoiceConfig": {
                        "speakerVoiceConfigs": speaker_voice_configs,
                    }
                },
            },
        });

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.endpoint, MODEL, self.api_key
        );

        let response = tokio::time::timeout(self.call_timeout, self.client.post(&url).json(&body).send())
            .await
            .map_err(|_| PipelineError::deferrable("TTS call timed out"))??;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &text));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(PipelineError::from)?;

        let part = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| p.inline_data.as_ref())
            .ok_or_else(|| PipelineError::fatal_external("no audio data in TTS response"))?;

        let raw = base64::engine::general_purpose::STANDARD
            .decode(&part.data)
            .map_err(|e| PipelineError::fatal_external(format!("invalid base64 audio: {}", e)))?;

        Ok(wav::convert_to_wav(&raw, &part.mime_type))
    }
}

fn speaker_voice_config(speaker: &SpeakerVoice) -> serde_json::Value {
    json!({
        "speaker": speaker.role,
        "voiceConfig": {
            "prebuiltVoiceConfig": { "voiceName": speaker.voice },
        },
    })
}

/// Classifies an HTTP failure into the error taxonomy: 429 is
/// rate-limit-deferrable (honoring the service's reported retry delay when
/// present), 5xx is transient, anything else is fatal.
fn classify_error(status: u16, body: &str) -> PipelineError {
    if status == 429 {
        let delay = parse_retry_delay(body, Duration::from_secs(60));
        return PipelineError::deferrable_after(format!("rate limited: {}", body), delay);
    }
    if (500..600).contains(&status) {
        return PipelineError::transient_local(format!("TTS service error {}: {}", status, body));
    }
    PipelineError::fatal_external(format!("TTS request rejected {}: {}", status, body))
}

#[async_trait]
impl TtsClient for GeminiTtsClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        let mut last_err = None;
        for attempt in 0..=MAX_RETRIES {
            match self.call_once(request).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if err.deferrable_kind() || matches!(err, PipelineError::FatalExternal { .. }) => {
                    return Err(err);
                }
                Err(err) => {
                    last_err = Some(err);
                    if attempt < MAX_RETRIES {
                        let backoff = BACKOFF_SCHEDULE_SECONDS[attempt as usize];
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                    }
                }
            }
        }
        let message = last_err
            .map(|err| err.to_string())
            .unwrap_or_else(|| "TTS synthesis failed".to_string());
        Err(PipelineError::deferrable(format!(
            "TTS retry budget exhausted: {}",
            message
        )))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_error_maps_rate_limit_with_parsed_delay() {
        let err = classify_error(429, r#"retryDelay: "30s""#);
        match err {
            PipelineError::Deferrable { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("expected Deferrable, got {:?}", other),
        }
    }

    #[test]
    fn classify_error_maps_server_error_to_transient() {
        let err = classify_error(503, "unavailable");
        assert!(matches!(err, PipelineError::TransientLocal { .. }));
    }

    #[test]
    fn classify_error_maps_bad_request_to_fatal() {
        let err = classify_error(400, "invalid voice");
        assert!(matches!(err, PipelineError::FatalExternal { .. }));
    }
}
