use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::episode::PodcastFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerGender {
    Male,
    Female,
}

impl SpeakerGender {
    pub fn as_str(self) -> &'static str {
        match self {
            SpeakerGender::Male => "male",
            SpeakerGender::Female => "female",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastConfiguration {
    pub id: Uuid,
    pub podcast_id: Uuid,
    pub speaker1_role: String,
    pub speaker1_gender: SpeakerGender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker2_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker2_gender: Option<SpeakerGender>,
    pub language: String,
    pub target_duration_minutes: u32,
    pub content_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_hours: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)>,
    #[serde(default)]
    pub filtered_domains: Vec<String>,
    #[serde(default)]
    pub media_types: Vec<String>,
    #[serde(default)]
    pub additional_instructions: Option<String>,
    pub podcast_format: PodcastFormat,
}
