use serde::Deserialize;
use serde_json::json;

use crate::domain::SpeakerGender;
use crate::error::{PipelineError, Result};
use crate::llm::LlmClient;

const MAX_CONTENT_CHARS: usize = 2000;
const CLASSIFICATION_TEMPERATURE: f64 = 0.3;
const CLASSIFICATION_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    News,
    Technology,
    Finance,
    Politics,
    Sports,
    Health,
    Science,
    Entertainment,
    Business,
    Education,
    Lifestyle,
    General,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::News => "news",
            ContentType::Technology => "technology",
            ContentType::Finance => "finance",
            ContentType::Politics => "politics",
            ContentType::Sports => "sports",
            ContentType::Health => "health",
            ContentType::Science => "science",
            ContentType::Entertainment => "entertainment",
            ContentType::Business => "business",
            ContentType::Education => "education",
            ContentType::Lifestyle => "lifestyle",
            ContentType::General => "general",
        }
    }

    fn from_str(s: &str) -> ContentType {
        match s {
            "news" => ContentType::News,
            "technology" => ContentType::Technology,
            "finance" => ContentType::Finance,
            "politics" => ContentType::Politics,
            "sports" => ContentType::Sports,
            "health" => ContentType::Health,
            "science" => ContentType::Science,
            "entertainment" => ContentType::Entertainment,
            "business" => ContentType::Business,
            "education" => ContentType::Education,
            "lifestyle" => ContentType::Lifestyle,
            _ => ContentType::General,
        }
    }

    const ALL: [ContentType; 12] = [
        ContentType::News,
        ContentType::Technology,
        ContentType::Finance,
        ContentType::Politics,
        ContentType::Sports,
        ContentType::Health,
        ContentType::Science,
        ContentType::Entertainment,
        ContentType::Business,
        ContentType::Education,
        ContentType::Lifestyle,
        ContentType::General,
    ];

    /// Default voice gender for a category's second speaker, per the
    /// source system's fixed category/gender table.
    pub fn default_gender(self) -> SpeakerGender {
        match self {
            ContentType::News
            | ContentType::Politics
            | ContentType::Health
            | ContentType::Entertainment
            | ContentType::Education
            | ContentType::Lifestyle => SpeakerGender::Female,
            _ => SpeakerGender::Male,
        }
    }

    /// Guidance text handed to the role-naming prompt, one line per
    /// category matching the source system's `ROLE_GUIDELINES` table.
    fn role_guidance(self) -> &'static str {
        match self {
            ContentType::News => "News reporter, correspondent, anchor, or journalist specialist",
            ContentType::Technology => "Tech expert, software engineer, AI researcher, or tech analyst",
            ContentType::Finance => "Financial analyst, economist, market expert, or investment advisor",
            ContentType::Politics => "Political analyst, policy expert, or government affairs specialist",
            ContentType::Sports => "Sports analyst, commentator, or athletic expert",
            ContentType::Health => "Medical expert, health specialist, or wellness advisor",
            ContentType::Science => "Research scientist, academic expert, or science communicator",
            ContentType::Entertainment => "Entertainment critic, media analyst, or cultural commentator",
            ContentType::Business => "Business analyst, industry expert, or corporate strategist",
            ContentType::Education => "Educational expert, academic, or learning specialist",
            ContentType::Lifestyle => "Lifestyle expert, personal development coach, or wellness guru",
            ContentType::General => "Subject matter expert or knowledgeable analyst",
        }
    }
}

/// Outcome of classifying the collected content: a category plus a
/// specific, content-matched role name for the second speaker.
#[derive(Debug, Clone)]
pub struct ContentAnalysisResult {
    pub content_type: ContentType,
    pub specific_role: String,
    pub role_description: String,
    pub confidence: f64,
    pub reasoning: String,
}

impl ContentAnalysisResult {
    fn fallback(reasoning: impl Into<String>) -> Self {
        ContentAnalysisResult {
            content_type: ContentType::General,
            specific_role: "Expert Analyst".to_string(),
            role_description: "General subject matter expert".to_string(),
            confidence: 0.5,
            reasoning: reasoning.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClassificationResponse {
    content_type: String,
    specific_role: String,
    role_description: String,
    confidence: f64,
    reasoning: String,
}

fn response_schema() -> serde_json::Value {
    let categories: Vec<&'static str> = ContentType::ALL.iter().map(|c| c.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "content_type": { "type": "string", "enum": categories },
            "specific_role": { "type": "string" },
            "role_description": { "type": "string" },
            "confidence": { "type": "number" },
            "reasoning": { "type": "string" },
        },
        "required": ["content_type", "specific_role", "role_description", "confidence", "reasoning"],
    })
}

fn build_prompt(content_text: &str) -> String {
    let truncated: String = if content_text.chars().count() > MAX_CONTENT_CHARS {
        let head: String = content_text.chars().take(MAX_CONTENT_CHARS).collect();
        format!("{}...", head)
    } else {
        content_text.to_string()
    };

    format!(
        "You are a content classification expert. Analyze the following content and determine its primary category, then create a specific, engaging speaker role.\n\n\
CONTENT TO ANALYZE:\n{}\n\n\
AVAILABLE CATEGORIES: news, technology, finance, politics, sports, health, science, entertainment, business, education, lifestyle, general\n\n\
ROLE CREATION GUIDELINES:\n\
- news: {}\n\
- technology: {}\n\
- finance: {}\n\
- politics: {}\n\
- sports: {}\n\
- health: {}\n\
- science: {}\n\
- entertainment: {}\n\
- business: {}\n\
- education: {}\n\
- lifestyle: {}\n\
- general: {}\n\n\
INSTRUCTIONS:\n\
1. Select the primary category from the list above.\n\
2. Create a specific, professional role name that precisely matches the content.\n\
3. Write a brief role description explaining their expertise.\n\
4. Provide a confidence score based on how clear the categorization is.\n\
5. Give reasoning for both the category and role selection.\n\n\
Consider the language and cultural context of the content when making your decisions.",
        truncated,
        ContentType::News.role_guidance(),
        ContentType::Technology.role_guidance(),
        ContentType::Finance.role_guidance(),
        ContentType::Politics.role_guidance(),
        ContentType::Sports.role_guidance(),
        ContentType::Health.role_guidance(),
        ContentType::Science.role_guidance(),
        ContentType::Entertainment.role_guidance(),
        ContentType::Business.role_guidance(),
        ContentType::Education.role_guidance(),
        ContentType::Lifestyle.role_guidance(),
        ContentType::General.role_guidance(),
    )
}

/// Classifies collected content into a category and a specific speaker
/// role for the second voice, via a structured-output LLM call. Falls
/// back to a general-purpose role on any LLM failure rather than
/// propagating the error, matching the source system's best-effort
/// classification behavior.
pub async fn analyze_content(
    llm: &dyn LlmClient,
    content_text: &str,
) -> Result<ContentAnalysisResult> {
    if content_text.trim().is_empty() {
        return Ok(ContentAnalysisResult::fallback(
            "No content found for analysis, using default role",
        ));
    }

    let prompt = build_prompt(content_text);
    let schema = response_schema();

    let result = llm
        .generate_structured(&prompt, &schema, CLASSIFICATION_TEMPERATURE, CLASSIFICATION_MAX_TOKENS)
        .await;

    match result {
        Ok(value) => {
            let parsed: ClassificationResponse = serde_json::from_value(value).map_err(PipelineError::from)?;
            Ok(ContentAnalysisResult {
                content_type: ContentType::from_str(&parsed.content_type),
                specific_role: parsed.specific_role,
                role_description: parsed.role_description,
                confidence: parsed.confidence,
                reasoning: parsed.reasoning,
            })
        }
        Err(err) => Ok(ContentAnalysisResult::fallback(format!(
            "Error in analysis ({}), using default role",
            err
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStructure {
    SingleTopic,
    Linear,
    ThematicClusters,
    NarrativeArc,
}

impl ConversationStructure {
    fn from_str(s: &str) -> ConversationStructure {
        match s {
            "single_topic" => ConversationStructure::SingleTopic,
            "thematic_clusters" => ConversationStructure::ThematicClusters,
            "narrative_arc" => ConversationStructure::NarrativeArc,
            _ => ConversationStructure::Linear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStyle {
    Seamless,
    Explicit,
    Narrative,
    Contrast,
}

impl TransitionStyle {
    fn from_str(s: &str) -> TransitionStyle {
        match s {
            "explicit" => TransitionStyle::Explicit,
            "narrative" => TransitionStyle::Narrative,
            "contrast" => TransitionStyle::Contrast,
            _ => TransitionStyle::Seamless,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Topic {
    pub topic_name: String,
    pub importance: String,
    pub suggested_duration: String,
}

#[derive(Debug, Clone)]
pub struct TopicAnalysisResult {
    pub topics: Vec<Topic>,
    pub conversation_structure: ConversationStructure,
    pub transition_style: TransitionStyle,
}

#[derive(Debug, Deserialize)]
struct TopicResponse {
    #[serde(default)]
    topics: Vec<TopicEntry>,
    #[serde(default = "default_structure")]
    conversation_structure: String,
    #[serde(default = "default_transition")]
    transition_style: String,
}

fn default_structure() -> String {
    "linear".to_string()
}

fn default_transition() -> String {
    "seamless".to_string()
}

#[derive(Debug, Deserialize)]
struct TopicEntry {
    topic_name: String,
    #[serde(default = "default_importance")]
    importance: String,
    #[serde(default = "default_duration")]
    suggested_duration: String,
}

fn default_importance() -> String {
    "medium".to_string()
}

fn default_duration() -> String {
    "brief".to_string()
}

fn topic_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "topics": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "topic_name": { "type": "string" },
                        "importance": { "type": "string", "enum": ["high", "medium", "low"] },
                        "suggested_duration": { "type": "string" },
                    },
                    "required": ["topic_name", "importance"],
                },
            },
            "conversation_structure": {
                "type": "string",
                "enum": ["single_topic", "linear", "thematic_clusters", "narrative_arc"],
            },
            "transition_style": {
                "type": "string",
                "enum": ["seamless", "explicit", "narrative", "contrast"],
            },
        },
        "required": ["topics", "conversation_structure", "transition_style"],
    })
}

fn topic_prompt(content_text: &str) -> String {
    let truncated: String = if content_text.chars().count() > MAX_CONTENT_CHARS {
        let head: String = content_text.chars().take(MAX_CONTENT_CHARS).collect();
        format!("{}...", head)
    } else {
        content_text.to_string()
    };

    format!(
        "Identify the distinct topics discussed in the following content, \
their relative importance (high/medium/low), and a suggested conversation \
structure and transition style for a two-speaker podcast covering them.\n\n\
CONTENT:\n{}\n\n\
conversation_structure options: single_topic, linear, thematic_clusters, narrative_arc\n\
transition_style options: seamless, explicit, narrative, contrast",
        truncated,
    )
}

/// Identifies the content's distinct topics and a recommended
/// conversation structure/transition style, via a second structured-output
/// LLM call distinct from category classification.
pub async fn analyze_topics(llm: &dyn LlmClient, content_text: &str) -> Result<TopicAnalysisResult> {
    if content_text.trim().is_empty() {
        return Ok(TopicAnalysisResult {
            topics: Vec::new(),
            conversation_structure: ConversationStructure::Linear,
            transition_style: TransitionStyle::Seamless,
        });
    }

    let prompt = topic_prompt(content_text);
    let schema = topic_schema();
    let value = llm
        .generate_structured(&prompt, &schema, CLASSIFICATION_TEMPERATURE, CLASSIFICATION_MAX_TOKENS)
        .await?;
    let parsed: TopicResponse = serde_json::from_value(value).map_err(PipelineError::from)?;

    Ok(TopicAnalysisResult {
        topics: parsed
            .topics
            .into_iter()
            .map(|t| Topic {
                topic_name: t.topic_name,
                importance: t.importance,
                suggested_duration: t.suggested_duration,
            })
            .collect(),
        conversation_structure: ConversationStructure::from_str(&parsed.conversation_structure),
        transition_style: TransitionStyle::from_str(&parsed.transition_style),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubLlm(serde_json::Value);

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn generate_structured(
            &self,
            _prompt: &str,
            _schema: &serde_json::Value,
            _temperature: f64,
            _max_output_tokens: u32,
        ) -> Result<serde_json::Value> {
            Ok(self.0.clone())
        }

        async fn generate_text(&self, _prompt: &str, _temperature: f64) -> Result<String> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn empty_content_returns_fallback_without_calling_llm() {
        let llm = StubLlm(json!({}));
        let result = analyze_content(&llm, "").await.unwrap();
        assert_eq!(result.content_type, ContentType::General);
    }

    #[tokio::test]
    async fn parses_structured_classification_response() {
        let llm = StubLlm(json!({
            "content_type": "technology",
            "specific_role": "AI Research Scientist",
            "role_description": "Expert in machine learning",
            "confidence": 0.92,
            "reasoning": "Content discusses AI models"
        }));
        let result = analyze_content(&llm, "a long discussion about new AI models").await.unwrap();
        assert_eq!(result.content_type, ContentType::Technology);
        assert_eq!(result.specific_role, "AI Research Scientist");
    }

    #[tokio::test]
    async fn empty_content_skips_topic_llm_call() {
        let llm = StubLlm(json!({}));
        let result = analyze_topics(&llm, "").await.unwrap();
        assert!(result.topics.is_empty());
        assert_eq!(result.conversation_structure, ConversationStructure::Linear);
    }

    #[tokio::test]
    async fn parses_topic_analysis_response() {
        let llm = StubLlm(json!({
            "topics": [{ "topic_name": "elections", "importance": "high", "suggested_duration": "5m" }],
            "conversation_structure": "thematic_clusters",
            "transition_style": "contrast"
        }));
        let result = analyze_topics(&llm, "discussion of the upcoming elections").await.unwrap();
        assert_eq!(result.topics.len(), 1);
        assert_eq!(result.conversation_structure, ConversationStructure::ThematicClusters);
        assert_eq!(result.transition_style, TransitionStyle::Contrast);
    }

    #[test]
    fn default_gender_matches_category_table() {
        assert_eq!(ContentType::News.default_gender(), SpeakerGender::Female);
        assert_eq!(ContentType::Technology.default_gender(), SpeakerGender::Male);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_instead_of_erroring() {
        struct FailingLlm;
        #[async_trait]
        impl LlmClient for FailingLlm {
            async fn generate_structured(
                &self,
                _prompt: &str,
                _schema: &serde_json::Value,
                _temperature: f64,
                _max_output_tokens: u32,
            ) -> Result<serde_json::Value> {
                Err(PipelineError::fatal_external("down"))
            }
            async fn generate_text(&self, _prompt: &str, _temperature: f64) -> Result<String> {
                unimplemented!()
            }
        }
        let result = analyze_content(&FailingLlm, "some content").await.unwrap();
        assert_eq!(result.content_type, ContentType::General);
    }
}
