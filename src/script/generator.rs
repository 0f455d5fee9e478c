use crate::content::{
    ContentAnalysisResult, ContentMetrics, ConversationStructure, Strategy, Topic, TopicAnalysisResult,
    TransitionStyle,
};
use crate::domain::SpeakerGender;
use crate::error::{PipelineError, Result};
use crate::llm::LlmClient;

use super::validator::check_for_placeholders;

const SCRIPT_TEMPERATURE: f64 = 0.7;
const SCRIPT_MAX_TOKENS: u32 = 32_768;

/// Everything the prompt builder needs about the podcast's configuration
/// and the episode's two speakers.
#[derive(Debug, Clone)]
pub struct ScriptContext<'a> {
    pub podcast_name: &'a str,
    pub language: &'a str,
    pub target_duration_minutes: u32,
    pub speaker1_role: &'a str,
    pub speaker2_role: &'a str,
    pub speaker1_gender: SpeakerGender,
    pub speaker2_gender: SpeakerGender,
    pub speaker1_voice: &'a str,
    pub speaker2_voice: &'a str,
    pub additional_instructions: &'a str,
}

fn structure_description(structure: ConversationStructure) -> &'static str {
    match structure {
        ConversationStructure::SingleTopic => "Focus deeply on one main subject throughout",
        ConversationStructure::Linear => "Cover topics in chronological or logical order",
        ConversationStructure::ThematicClusters => "Group related topics together for thematic flow",
        ConversationStructure::NarrativeArc => {
            "Build a story from introduction to climax to conclusion"
        }
    }
}

fn transition_guidance(style: TransitionStyle) -> &'static str {
    match style {
        TransitionStyle::Seamless => {
            "Make topics flow naturally into each other without explicit announcements"
        }
        TransitionStyle::Explicit => {
            r#"Use clear transitions like "Moving on to...", "Another interesting topic is...""#
        }
        TransitionStyle::Narrative => {
            "Connect topics with a story thread, showing cause-effect relationships"
        }
        TransitionStyle::Contrast => "Highlight differences between topics for added interest",
    }
}

fn strategy_directive(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Expansion => {
            "Content is light: expand with context, background, and discussion to fill the \
target duration comprehensively. Do not pad with filler; add genuine analysis."
        }
        Strategy::Balanced => "Cover the content at a natural, even pace.",
        Strategy::Compression => {
            "Content is dense: be selective, focus on the highest-priority items, and \
summarize rather than enumerate every detail."
        }
    }
}

fn format_content(messages: &[String]) -> String {
    if messages.is_empty() {
        return "No content available for discussion.".to_string();
    }
    let mut lines = Vec::with_capacity(messages.len());
    for (i, text) in messages.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, text.trim()));
    }
    lines.join("\n")
}

fn topics_section(analysis: &TopicAnalysisResult) -> String {
    if analysis.topics.is_empty() {
        return String::new();
    }
    let topic_list: Vec<String> = analysis
        .topics
        .iter()
        .enumerate()
        .map(|(i, t): (usize, &Topic)| {
            format!(
                "   {}. {} (importance: {}, duration: {})",
                i + 1,
                t.topic_name,
                t.importance,
                t.suggested_duration
            )
        })
        .collect();

    format!(
        "CONVERSATION STRUCTURE & TOPICS:\n\nIdentified Topics ({} topics):\n{}\n\n\
Recommended Structure: {}\nTransition Style: {}\n",
        analysis.topics.len(),
        topic_list.join("\n"),
        structure_description(analysis.conversation_structure),
        transition_guidance(analysis.transition_style),
    )
}

fn content_analysis_section(analysis: &ContentAnalysisResult, fallback_role: &str) -> String {
    format!(
        "CONTENT ANALYSIS:\n- Content Type: {}\n- Specific Speaker Role: {}\n- Role Description: {}\n\
- Analysis Confidence: {:.2}\n- Selection Reasoning: {}\n",
        analysis.content_type.as_str(),
        if analysis.specific_role.is_empty() { fallback_role } else { &analysis.specific_role },
        analysis.role_description,
        analysis.confidence,
        analysis.reasoning,
    )
}

fn build_prompt(
    ctx: &ScriptContext,
    messages: &[String],
    metrics: &ContentMetrics,
    content_analysis: Option<&ContentAnalysisResult>,
    topic_analysis: Option<&TopicAnalysisResult>,
) -> String {
    let voice_info = format!(
        "VOICE SELECTION FOR THIS EPISODE:\n- {} will use voice: {}\n- {} will use voice: {}\n",
        ctx.speaker1_role, ctx.speaker1_voice, ctx.speaker2_role, ctx.speaker2_voice
    );

    let content_info = content_analysis
        .map(|a| content_analysis_section(a, ctx.speaker2_role))
        .unwrap_or_default();

    let topic_info = topic_analysis.map(topics_section).unwrap_or_default();

    format!(
        "Generate a natural, engaging two-speaker podcast conversation script.\n\n\
PODCAST: {}\nLANGUAGE: {}\nTARGET DURATION: {} minutes\n\n\
SPEAKERS:\n- {} ({:?})\n- {} ({:?})\n\n\
{}\n{}\n{}\n\
CONTENT TO DISCUSS:\n{}\n\n\
STRATEGY: {}\n\n\
FORMAT REQUIREMENTS:\n\
- Plain dialogue lines only, each prefixed by the speaker's role label, e.g. \"{}: ...\".\n\
- No speaker names beyond the role labels. No metadata or surrounding prose.\n\
- Use TTS markup sparingly: [pause], [emphasis]...[/emphasis], [excited], [thoughtful].\n\
- Never invent placeholder names, dates, or facts not present in the content above.\n\n\
{}",
        ctx.podcast_name,
        ctx.language,
        ctx.target_duration_minutes,
        ctx.speaker1_role,
        ctx.speaker1_gender,
        ctx.speaker2_role,
        ctx.speaker2_gender,
        voice_info,
        content_info,
        topic_info,
        format_content(messages),
        strategy_directive(metrics.strategy),
        ctx.speaker1_role,
        ctx.additional_instructions,
    )
}

/// Drafts a conversation script via a single LLM call, then rejects
/// obviously templated output (placeholder names, `TBD`/`TODO`, etc.)
/// rather than silently shipping it.
pub async fn generate_script(
    llm: &dyn LlmClient,
    ctx: &ScriptContext<'_>,
    messages: &[String],
    metrics: &ContentMetrics,
    content_analysis: Option<&ContentAnalysisResult>,
    topic_analysis: Option<&TopicAnalysisResult>,
) -> Result<String> {
    let prompt = build_prompt(ctx, messages, metrics, content_analysis, topic_analysis);
    let script = llm.generate_text(&prompt, SCRIPT_TEMPERATURE).await?;
    let script = script.trim().to_string();

    if script.is_empty() {
        return Err(PipelineError::fatal_external("no script generated"));
    }

    if let Err(pattern) = check_for_placeholders(&script) {
        return Err(PipelineError::fatal_external(format!(
            "script contains placeholder text: '{}'",
            pattern
        )));
    }

    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{analyze_content as analyze_metrics, ContentType};
    use async_trait::async_trait;

    struct StubLlm(String);

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn generate_structured(
            &self,
            _prompt: &str,
            _schema: &serde_json::Value,
            _temperature: f64,
            _max_output_tokens: u32,
        ) -> Result<serde_json::Value> {
            unimplemented!()
        }
        async fn generate_text(&self, _prompt: &str, _temperature: f64) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn ctx() -> ScriptContext<'static> {
        ScriptContext {
            podcast_name: "Daily Briefing",
            language: "en",
            target_duration_minutes: 10,
            speaker1_role: "Host",
            speaker2_role: "Expert",
            speaker1_gender: SpeakerGender::Male,
            speaker2_gender: SpeakerGender::Female,
            speaker1_voice: "Gacrux",
            speaker2_voice: "Leda",
            additional_instructions: "",
        }
    }

    #[tokio::test]
    async fn generate_script_returns_clean_dialogue() {
        let llm = StubLlm("Host: Welcome to the show.\nExpert: Glad to be here.".to_string());
        let messages = vec!["something happened today".to_string()];
        let metrics = analyze_metrics(&messages);
        let script = generate_script(&llm, &ctx(), &messages, &metrics, None, None)
            .await
            .unwrap();
        assert!(script.starts_with("Host:"));
    }

    #[tokio::test]
    async fn generate_script_rejects_placeholder_output() {
        let llm = StubLlm("Host: Welcome [name] to the show.".to_string());
        let messages = vec!["something happened today".to_string()];
        let metrics = analyze_metrics(&messages);
        let result = generate_script(&llm, &ctx(), &messages, &metrics, None, None).await;
        assert!(result.is_err());
    }

    #[test]
    fn content_type_unused_variant_has_default_role() {
        let _ = ContentType::General;
    }
}
