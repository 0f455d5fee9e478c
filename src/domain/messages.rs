use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::episode::PodcastFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectMessage {
    pub podcast_config_id: Uuid,
    pub podcast_id: Uuid,
    pub episode_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessMessage {
    pub podcast_config_id: Uuid,
    pub podcast_id: Uuid,
    pub episode_id: Uuid,
    pub s3_path: String,
}

/// Per-episode derived parameters produced by the preprocessor and consumed
/// by the synthesizer (the "dynamic config" bundle, §6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DynamicConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub podcast_format: Option<PodcastFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker1_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker1_gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker1_voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker2_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker2_gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker2_voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_analysis: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_analysis: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizeMessage {
    pub podcast_config_id: Uuid,
    pub podcast_id: Uuid,
    pub episode_id: Uuid,
    pub script_url: String,
    #[serde(default)]
    pub dynamic_config: DynamicConfig,
}
