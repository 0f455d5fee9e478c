use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::chunk::{self, wav as chunk_wav};
use crate::db::Database;
use crate::diacritize::{self, DiacritizationClient};
use crate::domain::{
    Episode, EpisodeMetadata, PodcastFormat, ProcessingLog, ProcessingStage, SpeakerGender,
    StageStatus, SynthesizeMessage,
};
use crate::error::{PipelineError, Result};
use crate::logging::log_invocation;
use crate::storage::{keys, BlobStore};
use crate::tracker::EpisodeTracker;
use crate::tts::{SpeakerVoice, SynthesisRequest, TtsClient};
use crate::voice::VoiceRegistry;

/// Minimum invocation time required to start a synthesis attempt at all.
/// Below this the worker defers rather than doing partial work it can't
/// finish (480s of audio generation + 60s setup + 60s buffer).
const MIN_BUDGET_FOR_ENTRY: Duration = Duration::from_secs(600);
/// Minimum invocation time required, checked again after script load and
/// diacritization, before committing to the chunking/rendering pass.
const MIN_BUDGET_FOR_AUDIO: Duration = Duration::from_secs(540);
/// Extra attempts a single chunk gets after failing post-synthesis
/// validation (e.g. extended silence), beyond its first attempt.
const CHUNK_VALIDATION_RETRIES: u32 = 1;

/// Synthesizes one chunk and validates the result, retrying the whole
/// synthesize-then-validate unit up to `max_retries` times when validation
/// fails. A synthesis error (rate limit, timeout, TTS-side retry
/// exhaustion) propagates immediately without a validation retry — only a
/// chunk that renders but fails validation (§4.3) gets re-synthesized here.
async fn synthesize_chunk_with_retry(
    tts: &dyn TtsClient,
    request: &SynthesisRequest,
    max_retries: u32,
) -> Result<Vec<u8>> {
    let mut last_err = None;
    for attempt in 0..=max_retries {
        let bytes = tts.synthesize(request).await?;
        let duration = chunk_wav::calculate_duration_seconds(&bytes);
        match chunk_wav::validate_chunk(&bytes, duration) {
            Ok(()) => return Ok(bytes),
            Err(err) => {
                tracing::warn!(attempt, error = %err, "chunk failed validation, retrying");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| PipelineError::fatal_external("chunk validation failed")))
}

fn parse_gender(value: &str) -> SpeakerGender {
    if value.eq_ignore_ascii_case("female") {
        SpeakerGender::Female
    } else {
        SpeakerGender::Male
    }
}

/// True if the given Hebrew text already carries niqqud, to avoid paying
/// for (and risking) a redundant diacritization pass.
fn already_diacritized(text: &str) -> bool {
    let hebrew_chars = text.chars().filter(|c| ('\u{0590}'..='\u{05FF}').contains(c)).count();
    if hebrew_chars == 0 {
        return false;
    }
    let niqqud_chars = text
        .chars()
        .filter(|c| ('\u{05B0}'..='\u{05BC}').contains(c) || *c == '\u{05C1}' || *c == '\u{05C2}')
        .count();
    (niqqud_chars as f64) > (hebrew_chars as f64) * 0.05
}

/// Resolved voice assignment for one episode, regardless of whether it came
/// from the queue message, persisted episode metadata, or a fresh
/// deterministic re-selection.
struct VoiceBundle {
    language: String,
    content_type: String,
    speaker1_role: String,
    speaker1_gender: SpeakerGender,
    speaker1_voice: String,
    speaker2_role: Option<String>,
    speaker2_gender: Option<SpeakerGender>,
    speaker2_voice: Option<String>,
}

/// Renders a validated script into a single published audio file.
/// Implements `script_ready -> audio_processing -> completed | script_ready
/// (deferred) | failed`.
pub struct SynthesizerWorker {
    db: Arc<dyn Database>,
    blobs: Arc<dyn BlobStore>,
    tracker: Arc<EpisodeTracker>,
    tts: Arc<dyn TtsClient>,
    diacritizer: Arc<dyn DiacritizationClient>,
    voices: VoiceRegistry,
    chunk_max_chars: usize,
    chunk_max_workers: usize,
    invocation_budget: Duration,
    http: reqwest::Client,
    api_base_url: Option<String>,
    lambda_callback_secret: Option<String>,
}

impl SynthesizerWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<dyn Database>,
        blobs: Arc<dyn BlobStore>,
        tracker: Arc<EpisodeTracker>,
        tts: Arc<dyn TtsClient>,
        diacritizer: Arc<dyn DiacritizationClient>,
        chunk_max_chars: usize,
        chunk_max_workers: usize,
        invocation_budget: Duration,
        api_base_url: Option<String>,
        lambda_callback_secret: Option<String>,
    ) -> Self {
        SynthesizerWorker {
            db,
            blobs,
            tracker,
            tts,
            diacritizer,
            voices: VoiceRegistry::new(),
            chunk_max_chars,
            chunk_max_workers,
            invocation_budget,
            http: reqwest::Client::new(),
            api_base_url,
            lambda_callback_secret,
        }
    }

    pub async fn handle(&self, message: SynthesizeMessage) -> Result<()> {
        let episode_id = message.episode_id;
        let start = Instant::now();

        let episode = self.db.get_episode(episode_id).await?;
        if episode.is_past(ProcessingStage::AudioCompleted) {
            tracing::info!(%episode_id, "synthesizer: episode already past audio_completed, skipping");
            return Ok(());
        }

        log_invocation(episode_id, ProcessingStage::AudioProcessing, || {
            self.run(&message, &episode, start)
        })
        .await
    }

    async fn run(&self, message: &SynthesizeMessage, episode: &Episode, start: Instant) -> Result<()> {
        let episode_id = message.episode_id;

        self.tracker
            .log_stage_start(episode_id, ProcessingStage::AudioProcessing, json!({}))
            .await;

        let result = self.synthesize(message, episode, start).await;

        match &result {
            Ok(()) => {
                self.tracker
                    .log_stage_complete(episode_id, ProcessingStage::AudioCompleted, json!({}))
                    .await;
                self.send_completion_webhook(episode_id).await;
            }
            Err(err) if err.deferrable_kind() => {
                self.defer(episode_id, err).await;
            }
            Err(err) => {
                self.tracker
                    .log_stage_failure(episode_id, ProcessingStage::AudioProcessing, err, json!({}))
                    .await;
            }
        }

        result
    }

    /// Returns the episode to `script_ready` for redelivery instead of
    /// marking it `failed`, logging a processing-log row with `deferred`
    /// set so operators can tell a retriable defer apart from a real
    /// failure.
    async fn defer(&self, episode_id: Uuid, err: &PipelineError) {
        let log = ProcessingLog {
            id: None,
            episode_id,
            stage: ProcessingStage::AudioProcessing,
            status: StageStatus::Failed,
            started_at: None,
            completed_at: Some(Utc::now()),
            duration_ms: None,
            error_message: Some(err.to_string()),
            error_details: Some(err.to_log_details()),
            metadata: json!({}),
            deferred: true,
        };
        if let Err(insert_err) = self.db.insert_processing_log(&log).await {
            tracing::error!(%episode_id, error = %insert_err, "failed to insert deferred processing log");
        }
        if let Err(status_err) = self.db.update_episode_status(episode_id, "script_ready").await {
            tracing::error!(%episode_id, error = %status_err, "failed to return deferred episode to script_ready");
        }
        tracing::warn!(%episode_id, error = %err, "synthesis deferred, episode returned to script_ready for redelivery");
    }

    fn budget_remaining(&self, start: Instant) -> Duration {
        self.invocation_budget.saturating_sub(start.elapsed())
    }

    async fn synthesize(&self, message: &SynthesizeMessage, episode: &Episode, start: Instant) -> Result<()> {
        let episode_id = message.episode_id;
        let podcast_id = message.podcast_id;

        if self.budget_remaining(start) < MIN_BUDGET_FOR_ENTRY {
            return Err(PipelineError::deferrable(
                "insufficient invocation time remaining to start synthesis",
            ));
        }

        let bundle = self.resolve_voices(message, episode).await?;

        let raw_script = self.blobs.get(&message.script_url).await?;
        let script_text = String::from_utf8(raw_script)
            .map_err(|e| PipelineError::fatal_external(format!("script is not valid UTF-8: {}", e)))?;

        let should_diacritize =
            bundle.language.eq_ignore_ascii_case("hebrew") && !already_diacritized(&script_text);
        let final_script = if should_diacritize {
            diacritize::process_script_for_tts(self.diacritizer.as_ref(), &script_text, &bundle.language).await
        } else {
            script_text.clone()
        };

        if self.budget_remaining(start) < MIN_BUDGET_FOR_AUDIO {
            return Err(PipelineError::deferrable(
                "insufficient invocation time remaining before audio rendering",
            ));
        }

        let chunks = chunk::split(&final_script, self.chunk_max_chars);

        let style = self.voices.style_for(&bundle.language, &bundle.content_type);
        let speaker1 = SpeakerVoice {
            role: bundle.speaker1_role.clone(),
            gender: bundle.speaker1_gender,
            voice: bundle.speaker1_voice.clone(),
        };
        let speaker2 = bundle.speaker2_voice.clone().map(|voice| SpeakerVoice {
            role: bundle.speaker2_role.clone().unwrap_or_default(),
            gender: bundle.speaker2_gender.unwrap_or(SpeakerGender::Female),
            voice,
        });

        let tts = self.tts.clone();
        let synthesize_chunk = move |_index: usize, text: String| {
            let tts = tts.clone();
            let style = style.clone();
            let speaker1 = speaker1.clone();
            let speaker2 = speaker2.clone();
            async move {
                let request = SynthesisRequest {
                    text,
                    style,
                    speaker1,
                    speaker2,
                };
                synthesize_chunk_with_retry(tts.as_ref(), &request, CHUNK_VALIDATION_RETRIES).await
            }
        };

        let rendered = chunk::render_all(chunks, self.chunk_max_workers, synthesize_chunk).await?;

        let ordered_bytes: Vec<Vec<u8>> = rendered.into_iter().map(|c| c.bytes).collect();
        let combined = chunk_wav::concatenate(&ordered_bytes)?;
        let total_duration = chunk_wav::calculate_duration_seconds(&combined) as i64;

        let audio_key = keys::audio(&podcast_id.to_string(), &episode_id.to_string());
        self.blobs.put(&audio_key, combined, "audio/wav").await?;

        self.db
            .update_episode_audio_url(episode_id, &audio_key, "completed", total_duration)
            .await?;

        if should_diacritize {
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
            let diacritized_key =
                keys::diacritized_transcript(&podcast_id.to_string(), &episode_id.to_string(), &timestamp);
            self.blobs
                .put(&diacritized_key, final_script.into_bytes(), "text/plain")
                .await?;
        }

        Ok(())
    }

    /// Resolves the voice assignment for this episode: the normal path uses
    /// voices the preprocessor already selected and carried on the queue
    /// message; a replayed legacy message missing them falls back to
    /// whatever is persisted on the episode, and failing that re-selects
    /// deterministically from the podcast configuration and persists the
    /// result so future attempts don't need to re-derive it.
    async fn resolve_voices(&self, message: &SynthesizeMessage, episode: &Episode) -> Result<VoiceBundle> {
        let config = &message.dynamic_config;
        let content_type = config
            .content_analysis
            .as_ref()
            .and_then(|v| v.get("content_type"))
            .and_then(|v| v.as_str())
            .unwrap_or("general")
            .to_string();

        if let (Some(language), Some(role1), Some(gender1), Some(voice1)) = (
            config.language.as_deref(),
            config.speaker1_role.as_deref(),
            config.speaker1_gender.as_deref(),
            config.speaker1_voice.as_deref(),
        ) {
            return Ok(VoiceBundle {
                language: language.to_string(),
                content_type,
                speaker1_role: role1.to_string(),
                speaker1_gender: parse_gender(gender1),
                speaker1_voice: voice1.to_string(),
                speaker2_role: config.speaker2_role.clone(),
                speaker2_gender: config.speaker2_gender.as_deref().map(parse_gender),
                speaker2_voice: config.speaker2_voice.clone(),
            });
        }

        tracing::warn!(
            episode_id = %message.episode_id,
            "synthesize message carries no voice selection, reconstructing"
        );

        let metadata = &episode.metadata;
        if let (Some(language), Some(role1), Some(gender1), Some(voice1)) = (
            metadata.language_code.as_deref(),
            metadata.speaker1_role.as_deref(),
            metadata.speaker1_gender.as_deref(),
            metadata.speaker1_voice.as_deref(),
        ) {
            return Ok(VoiceBundle {
                language: language.to_string(),
                content_type,
                speaker1_role: role1.to_string(),
                speaker1_gender: parse_gender(gender1),
                speaker1_voice: voice1.to_string(),
                speaker2_role: metadata.speaker2_role.clone(),
                speaker2_gender: metadata.speaker2_gender.as_deref().map(parse_gender),
                speaker2_voice: metadata.speaker2_voice.clone(),
            });
        }

        let podcast_config = self.db.get_podcast_config_by_id(message.podcast_config_id).await?;
        let is_multi_speaker = matches!(podcast_config.podcast_format, PodcastFormat::MultiSpeaker);
        let speaker2_role = podcast_config.speaker2_role.clone().unwrap_or_else(|| "Expert".to_string());
        let speaker2_gender = podcast_config.speaker2_gender.unwrap_or(SpeakerGender::Female);

        let selection = if is_multi_speaker {
            self.voices.select_pair(
                &podcast_config.language,
                message.episode_id,
                &podcast_config.speaker1_role,
                podcast_config.speaker1_gender,
                &speaker2_role,
                speaker2_gender,
                true,
            )?
        } else {
            self.voices.select_single(&podcast_config.language, podcast_config.speaker1_gender)
        };

        let bundle = VoiceBundle {
            language: podcast_config.language.clone(),
            content_type,
            speaker1_role: podcast_config.speaker1_role.clone(),
            speaker1_gender: podcast_config.speaker1_gender,
            speaker1_voice: selection.speaker1_voice.clone(),
            speaker2_role: if is_multi_speaker { Some(speaker2_role.clone()) } else { None },
            speaker2_gender: if is_multi_speaker { Some(speaker2_gender) } else { None },
            speaker2_voice: selection.speaker2_voice.clone(),
        };

        let metadata = EpisodeMetadata {
            speaker1_voice: Some(bundle.speaker1_voice.clone()),
            speaker2_voice: bundle.speaker2_voice.clone(),
            speaker1_role: Some(bundle.speaker1_role.clone()),
            speaker2_role: bundle.speaker2_role.clone(),
            speaker1_gender: Some(bundle.speaker1_gender.as_str().to_string()),
            speaker2_gender: bundle.speaker2_gender.map(|g| g.as_str().to_string()),
            language_code: Some(bundle.language.clone()),
            podcast_format: Some(podcast_config.podcast_format),
            error: None,
        };
        self.db.update_episode_metadata(message.episode_id, &metadata).await?;

        Ok(bundle)
    }

    /// Notifies the application backend that the episode finished, the way
    /// the source system's completion callback did: best-effort, never
    /// allowed to fail an otherwise-completed episode.
    async fn send_completion_webhook(&self, episode_id: Uuid) {
        let Some(api_base_url) = &self.api_base_url else {
            return;
        };
        let url = format!("{}/api/episodes/{}/completed", api_base_url, episode_id);
        let mut request = self.http.post(&url);
        if let Some(secret) = &self.lambda_callback_secret {
            request = request.header("X-Callback-Secret", secret);
        }

        match request.send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(%episode_id, status = %response.status(), "completion webhook rejected");
            }
            Err(err) => {
                tracing::warn!(%episode_id, error = %err, "completion webhook request failed");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    #[test]
    fn already_diacritized_detects_niqqud_density() {
        assert!(already_diacritized("שָׁלוֹם עוֹלָם"));
        assert!(!already_diacritized("שלום עולם"));
        assert!(!already_diacritized("hello world"));
    }

    #[test]
    fn parse_gender_defaults_to_male_on_unknown() {
        assert_eq!(parse_gender("female"), SpeakerGender::Female);
        assert_eq!(parse_gender("male"), SpeakerGender::Male);
        assert_eq!(parse_gender("unspecified"), SpeakerGender::Male);
    }

    fn request() -> SynthesisRequest {
        SynthesisRequest {
            text: "hello".to_string(),
            style: crate::voice::SpeechStyle {
                bcp47: "en-US",
                pace: "normal",
                tone: "neutral",
                volume: "normal",
                style_instruction: "",
            },
            speaker1: SpeakerVoice {
                role: "Host".to_string(),
                gender: SpeakerGender::Male,
                voice: "Gacrux".to_string(),
            },
            speaker2: None,
        }
    }

    /// 2 seconds of silent (all-zero) PCM: short enough to skip the
    /// extended-silence scan (only mandatory past 3s) but still a
    /// structurally valid WAV chunk.
    fn valid_chunk_bytes() -> Vec<u8> {
        chunk_wav::wrap_pcm(&vec![0u8; 24_000 * 2 * 2])
    }

    struct ScriptedTts {
        responses: Vec<Vec<u8>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TtsClient for ScriptedTts {
        async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Vec<u8>> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            Ok(self.responses[index.min(self.responses.len() - 1)].clone())
        }
    }

    #[tokio::test]
    async fn chunk_retry_recovers_after_one_failed_validation() {
        let tts = ScriptedTts {
            responses: vec![vec![0u8; 10], valid_chunk_bytes()],
            calls: AtomicU32::new(0),
        };
        let result = synthesize_chunk_with_retry(&tts, &request(), CHUNK_VALIDATION_RETRIES).await;
        assert!(result.is_ok());
        assert_eq!(tts.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn chunk_retry_fails_after_budget_exhausted() {
        let tts = ScriptedTts {
            responses: vec![vec![0u8; 10]],
            calls: AtomicU32::new(0),
        };
        let result = synthesize_chunk_with_retry(&tts, &request(), CHUNK_VALIDATION_RETRIES).await;
        assert!(matches!(result, Err(PipelineError::FatalExternal { .. })));
        assert_eq!(tts.calls.load(Ordering::SeqCst), 2);
    }
}
