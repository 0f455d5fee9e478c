use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::content::{
    analyze_content, analyze_topics, score_messages, select_priority_messages, ContentAnalysisResult,
    ContentCategory, PriorityLexicon, TopicAnalysisResult,
};
use crate::content::analyze_metrics;
use crate::db::Database;
use crate::domain::{
    ContentAnalysis as EpisodeContentAnalysis, DynamicConfig, PodcastFormat, PreprocessMessage,
    ProcessingStage, SynthesizeMessage,
};
use crate::error::{PipelineError, Result};
use crate::llm::LlmClient;
use crate::logging::log_invocation;
use crate::queue::Queue;
use crate::script::{generate_script, validate_script, ScriptContext, TopicLexicon};
use crate::storage::{keys, BlobStore};
use crate::tracker::EpisodeTracker;
use crate::voice::VoiceRegistry;

#[derive(Debug, Deserialize)]
struct RawMessage {
    text: String,
    #[serde(default)]
    date: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDocument {
    messages: Vec<RawMessage>,
}

/// Turns harvested content into a validated, voiced podcast script.
/// Implements `telegram_completed -> script_processing -> script_ready |
/// script_failed`.
pub struct PreprocessorWorker {
    db: Arc<dyn Database>,
    blobs: Arc<dyn BlobStore>,
    tracker: Arc<EpisodeTracker>,
    llm: Arc<dyn LlmClient>,
    voices: VoiceRegistry,
    priority_lexicon: PriorityLexicon,
    topic_lexicon: TopicLexicon,
    synthesize_queue: Arc<dyn Queue<SynthesizeMessage>>,
}

impl PreprocessorWorker {
    pub fn new(
        db: Arc<dyn Database>,
        blobs: Arc<dyn BlobStore>,
        tracker: Arc<EpisodeTracker>,
        llm: Arc<dyn LlmClient>,
        priority_lexicon: PriorityLexicon,
        topic_lexicon: TopicLexicon,
        synthesize_queue: Arc<dyn Queue<SynthesizeMessage>>,
    ) -> Self {
        PreprocessorWorker {
            db,
            blobs,
            tracker,
            llm,
            voices: VoiceRegistry::new(),
            priority_lexicon,
            topic_lexicon,
            synthesize_queue,
        }
    }

    pub async fn handle(&self, message: PreprocessMessage) -> Result<()> {
        let episode_id = message.episode_id;

        let episode = self.db.get_episode(episode_id).await?;
        if episode.is_past(ProcessingStage::ScriptCompleted) {
            tracing::info!(%episode_id, "preprocessor: episode already past script_completed, skipping");
            return Ok(());
        }

        log_invocation(episode_id, ProcessingStage::ScriptProcessing, || self.run(&message)).await
    }

    async fn run(&self, message: &PreprocessMessage) -> Result<()> {
        let episode_id = message.episode_id;

        self.tracker
            .log_stage_start(episode_id, ProcessingStage::ScriptProcessing, json!({}))
            .await;

        let result = self.preprocess(message).await;

        match &result {
            Ok(()) => {
                self.tracker
                    .log_stage_complete(episode_id, ProcessingStage::ScriptCompleted, json!({}))
                    .await;
            }
            Err(err) => {
                self.tracker
                    .log_stage_failure(episode_id, ProcessingStage::ScriptProcessing, err, json!({}))
                    .await;
            }
        }

        result
    }

    async fn preprocess(&self, message: &PreprocessMessage) -> Result<()> {
        let episode_id = message.episode_id;
        let podcast_id = message.podcast_id;

        let raw = self.blobs.get(&message.s3_path).await?;
        let mut document: ContentDocument = serde_json::from_slice(&raw).map_err(PipelineError::from)?;
        document.messages.sort_by_key(|m| m.date);

        let texts: Vec<String> = document.messages.iter().map(|m| m.text.clone()).collect();
        let metrics = analyze_metrics(&texts);

        let content_text = texts.join(" ");
        let content_analysis = analyze_content(self.llm.as_ref(), &content_text).await?;
        let topic_analysis = analyze_topics(self.llm.as_ref(), &content_text).await?;

        let prioritized_texts: Vec<String> = if metrics.category == ContentCategory::High {
            let scored = score_messages(&self.priority_lexicon, &texts);
            select_priority_messages(&scored).into_iter().map(|m| m.text).collect()
        } else {
            texts.clone()
        };

        let config = self
            .db
            .get_podcast_config_by_id(message.podcast_config_id)
            .await?;

        let is_multi_speaker = matches!(config.podcast_format, PodcastFormat::MultiSpeaker);
        let speaker2_role = if content_analysis.specific_role.is_empty() {
            config.speaker2_role.clone().unwrap_or_else(|| "Expert".to_string())
        } else {
            content_analysis.specific_role.clone()
        };
        let speaker2_gender = config
            .speaker2_gender
            .unwrap_or_else(|| content_analysis.content_type.default_gender());

        let voices = if is_multi_speaker {
            self.voices.select_pair(
                &config.language,
                episode_id,
                &config.speaker1_role,
                config.speaker1_gender,
                &speaker2_role,
                speaker2_gender,
                true,
            )?
        } else {
            self.voices.select_single(&config.language, config.speaker1_gender)
        };

        let script_ctx = ScriptContext {
            podcast_name: &config.content_source,
            language: &config.language,
            target_duration_minutes: config.target_duration_minutes,
            speaker1_role: &config.speaker1_role,
            speaker2_role: &speaker2_role,
            speaker1_gender: config.speaker1_gender,
            speaker2_gender,
            speaker1_voice: &voices.speaker1_voice,
            speaker2_voice: voices.speaker2_voice.as_deref().unwrap_or(""),
            additional_instructions: config.additional_instructions.as_deref().unwrap_or(""),
        };

        let script = generate_script(
            self.llm.as_ref(),
            &script_ctx,
            &prioritized_texts,
            &metrics,
            Some(&content_analysis),
            Some(&topic_analysis),
        )
        .await?;

        let validation = validate_script(
            &texts,
            &script,
            metrics.total_chars,
            metrics.target_ratio,
            &self.topic_lexicon,
        );
        if !validation.passed {
            tracing::warn!(
                %episode_id,
                quality_score = validation.quality_score,
                recommendations = ?validation.recommendations,
                "script validation below pass threshold; proceeding with warnings"
            );
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let clean_key = keys::clean_content_transcript(&podcast_id.to_string(), &episode_id.to_string(), &timestamp);
        let analysis_key = keys::analysis_transcript(&podcast_id.to_string(), &episode_id.to_string(), &timestamp);
        let script_key = keys::script_transcript(&podcast_id.to_string(), &episode_id.to_string(), &timestamp);

        self.blobs
            .put(&clean_key, serde_json::to_vec(&texts).map_err(PipelineError::from)?, "application/json")
            .await?;

        let analysis_document = analysis_document(&content_analysis, &topic_analysis, &validation);
        self.blobs
            .put(
                &analysis_key,
                serde_json::to_vec(&analysis_document).map_err(PipelineError::from)?,
                "application/json",
            )
            .await?;

        self.blobs.put(&script_key, script.clone().into_bytes(), "text/plain").await?;

        let analysis = EpisodeContentAnalysis {
            content_type: Some(content_analysis.content_type.as_str().to_string()),
            specific_role: Some(content_analysis.specific_role.clone()),
            role_description: Some(content_analysis.role_description.clone()),
            confidence: Some(content_analysis.confidence),
            reasoning: Some(content_analysis.reasoning.clone()),
            topics: topic_analysis.topics.iter().map(|t| t.topic_name.clone()).collect(),
            conversation_structure: Some(format!("{:?}", topic_analysis.conversation_structure)),
            transition_style: Some(format!("{:?}", topic_analysis.transition_style)),
        };

        self.db
            .update_episode_script_data(
                episode_id,
                &script_key,
                "script_ready",
                &serde_json::to_value(&analysis).map_err(PipelineError::from)?,
            )
            .await?;

        let dynamic_config = DynamicConfig {
            language_code: Some(script_ctx.language.to_string()),
            language: Some(config.language.clone()),
            podcast_format: Some(config.podcast_format),
            speaker1_role: Some(config.speaker1_role.clone()),
            speaker1_gender: Some(config.speaker1_gender.as_str().to_string()),
            speaker1_voice: Some(voices.speaker1_voice.clone()),
            speaker2_role: if is_multi_speaker { Some(speaker2_role.clone()) } else { None },
            speaker2_gender: if is_multi_speaker {
                Some(speaker2_gender.as_str().to_string())
            } else {
                None
            },
            speaker2_voice: voices.speaker2_voice.clone(),
            content_analysis: Some(serde_json::to_value(&analysis).map_err(PipelineError::from)?),
            topic_analysis: Some(json!({
                "topics": topic_analysis.topics.iter().map(|t| &t.topic_name).collect::<Vec<_>>(),
                "conversation_structure": format!("{:?}", topic_analysis.conversation_structure),
                "transition_style": format!("{:?}", topic_analysis.transition_style),
            })),
        };

        self.synthesize_queue
            .send(&SynthesizeMessage {
                podcast_config_id: message.podcast_config_id,
                podcast_id,
                episode_id,
                script_url: script_key,
                dynamic_config,
            })
            .await?;

        Ok(())
    }
}

fn analysis_document(
    content_analysis: &ContentAnalysisResult,
    topic_analysis: &TopicAnalysisResult,
    validation: &crate::script::ValidationReport,
) -> serde_json::Value {
    json!({
        "content_type": content_analysis.content_type.as_str(),
        "specific_role": content_analysis.specific_role,
        "role_description": content_analysis.role_description,
        "confidence": content_analysis.confidence,
        "reasoning": content_analysis.reasoning,
        "topics": topic_analysis.topics.iter().map(|t| &t.topic_name).collect::<Vec<_>>(),
        "conversation_structure": format!("{:?}", topic_analysis.conversation_structure),
        "transition_style": format!("{:?}", topic_analysis.transition_style),
        "validation": {
            "quality_score": validation.quality_score,
            "passed": validation.passed,
            "recommendations": validation.recommendations,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentType;
    use crate::script::ValidationReport;

    fn sample_content_analysis() -> ContentAnalysisResult {
        ContentAnalysisResult {
            content_type: ContentType::Technology,
            specific_role: "Tech Analyst".to_string(),
            role_description: "covers product launches".to_string(),
            confidence: 0.82,
            reasoning: "mentions of chips and releases".to_string(),
        }
    }

    fn sample_topic_analysis() -> TopicAnalysisResult {
        TopicAnalysisResult {
            topics: vec![crate::content::Topic {
                topic_name: "chip shortage".to_string(),
                importance: "high".to_string(),
                suggested_duration: "2m".to_string(),
            }],
            conversation_structure: crate::content::ConversationStructure::Linear,
            transition_style: crate::content::TransitionStyle::Explicit,
        }
    }

    fn sample_validation() -> ValidationReport {
        ValidationReport {
            quality_score: 0.9,
            actual_ratio: 1.0,
            target_ratio: 1.0,
            ratio_match_score: 1.0,
            coverage_score: 0.8,
            topics_in_content: 3,
            topics_covered: 2,
            missing_topics: vec!["exports".to_string()],
            hallucination_risk: 0.1,
            unique_words_count: 120,
            recommendations: vec!["tighten intro".to_string()],
            passed: true,
        }
    }

    #[test]
    fn analysis_document_carries_content_and_topic_fields() {
        let doc = analysis_document(
            &sample_content_analysis(),
            &sample_topic_analysis(),
            &sample_validation(),
        );

        assert_eq!(doc["content_type"], "technology");
        assert_eq!(doc["specific_role"], "Tech Analyst");
        assert_eq!(doc["topics"][0], "chip shortage");
        assert_eq!(doc["conversation_structure"], "Linear");
        assert_eq!(doc["validation"]["passed"], true);
        assert_eq!(doc["validation"]["recommendations"][0], "tighten intro");
    }
}
