use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse-grained lifecycle status of an episode. See `ProcessingStage` for
/// the finer-grained stage tag recorded alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    Pending,
    ContentCollected,
    ScriptReady,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Created,
    TelegramQueued,
    TelegramProcessing,
    TelegramCompleted,
    TelegramFailed,
    ScriptQueued,
    ScriptProcessing,
    ScriptCompleted,
    ScriptFailed,
    AudioQueued,
    AudioProcessing,
    AudioCompleted,
    AudioFailed,
    ImageProcessing,
    ImageFailed,
    PostProcessing,
    Published,
    Failed,
}

impl ProcessingStage {
    /// Maps a stage to the variant recorded when that stage fails.
    /// Mirrors the source system's `_get_failed_stage_variant` table.
    pub fn failed_variant(self) -> ProcessingStage {
        use ProcessingStage::*;
        match self {
            TelegramQueued | TelegramProcessing => TelegramFailed,
            ScriptQueued | ScriptProcessing => ScriptFailed,
            AudioQueued | AudioProcessing => AudioFailed,
            ImageProcessing => ImageFailed,
            _ => Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PodcastFormat {
    SingleSpeaker,
    MultiSpeaker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageHistoryEntry {
    pub stage: ProcessingStage,
    pub status: StageHistoryStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageHistoryStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EpisodeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker1_voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker2_voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker1_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker2_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker1_gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker2_gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub podcast_format: Option<PodcastFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContentAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_structure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    pub podcast_id: Uuid,
    pub podcast_config_id: Uuid,
    pub status: EpisodeStatus,
    pub current_stage: ProcessingStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_stage_update: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub metadata: EpisodeMetadata,
    #[serde(default)]
    pub analysis: ContentAnalysis,
    #[serde(default)]
    pub stage_history: Vec<StageHistoryEntry>,
}

impl Episode {
    /// True once the episode has moved past the collector's terminal stage,
    /// used by workers to detect replayed queue messages (idempotency, §5).
    pub fn is_past(&self, stage: ProcessingStage) -> bool {
        stage_rank(self.current_stage) > stage_rank(stage)
            || (stage_rank(self.current_stage) == stage_rank(stage) && self.current_stage != stage)
    }
}

/// Linear ordering used only for idempotency checks ("has this episode
/// already passed stage X"). Deferral back to `ScriptReady` is a status
/// transition, not a stage-rank regression, so this ordering is monotone for
/// every stage actually compared by callers.
fn stage_rank(stage: ProcessingStage) -> u8 {
    use ProcessingStage::*;
    match stage {
        Created => 0,
        TelegramQueued => 1,
        TelegramProcessing => 2,
        TelegramCompleted => 3,
        TelegramFailed => 3,
        ScriptQueued => 4,
        ScriptProcessing => 5,
        ScriptCompleted => 6,
        ScriptFailed => 6,
        AudioQueued => 7,
        AudioProcessing => 8,
        AudioCompleted => 9,
        AudioFailed => 9,
        ImageProcessing => 9,
        ImageFailed => 9,
        PostProcessing => 10,
        Published => 11,
        Failed => 11,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_variant_maps_known_stages() {
        assert_eq!(
            ProcessingStage::AudioProcessing.failed_variant(),
            ProcessingStage::AudioFailed
        );
        assert_eq!(
            ProcessingStage::ScriptQueued.failed_variant(),
            ProcessingStage::ScriptFailed
        );
    }

    #[test]
    fn failed_variant_defaults_to_generic_failed() {
        assert_eq!(
            ProcessingStage::PostProcessing.failed_variant(),
            ProcessingStage::Failed
        );
    }

    #[test]
    fn is_past_detects_replayed_messages() {
        let mut episode = sample_episode();
        episode.current_stage = ProcessingStage::ScriptCompleted;
        assert!(episode.is_past(ProcessingStage::TelegramCompleted));
        assert!(!episode.is_past(ProcessingStage::AudioProcessing));
    }

    fn sample_episode() -> Episode {
        Episode {
            id: Uuid::nil(),
            podcast_id: Uuid::nil(),
            podcast_config_id: Uuid::nil(),
            status: EpisodeStatus::Pending,
            current_stage: ProcessingStage::Created,
            last_stage_update: None,
            processing_started_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            content_url: None,
            script_url: None,
            audio_url: None,
            duration: 0,
            metadata: EpisodeMetadata::default(),
            analysis: ContentAnalysis::default(),
            stage_history: Vec::new(),
        }
    }
}
