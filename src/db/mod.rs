pub mod supabase;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use chrono::{DateTime, Utc};

use crate::domain::{
    Episode, EpisodeMetadata, PodcastConfiguration, ProcessingLog, ProcessingStage, StageHistoryEntry,
};
use crate::error::Result;

pub use supabase::SupabaseDatabase;

/// Everything a worker needs from the relational store. All mutating access
/// goes through stored procedures on the concrete implementation, mirroring
/// the row-level-security bypass the system this was adapted from relies on.
#[async_trait]
pub trait Database: Send + Sync {
    async fn get_episode(&self, episode_id: Uuid) -> Result<Episode>;

    async fn get_podcast_config_by_id(&self, config_id: Uuid) -> Result<PodcastConfiguration>;

    async fn get_podcast_config_by_podcast_id(
        &self,
        podcast_id: Uuid,
    ) -> Result<PodcastConfiguration>;

    async fn update_episode_status(
        &self,
        episode_id: Uuid,
        new_status: &str,
    ) -> Result<()>;

    async fn update_episode_audio_url(
        &self,
        episode_id: Uuid,
        audio_url: &str,
        new_status: &str,
        duration: i64,
    ) -> Result<()>;

    async fn update_episode_script_data(
        &self,
        episode_id: Uuid,
        script_url: &str,
        new_status: &str,
        analysis_data: &Value,
    ) -> Result<()>;

    async fn mark_episode_failed(&self, episode_id: Uuid, error_message: &str) -> Result<()>;

    async fn insert_processing_log(&self, log: &ProcessingLog) -> Result<()>;

    /// Updates the episode's `current_stage`/`last_stage_update`, and on
    /// the first stage also `processing_started_at`.
    async fn update_episode_stage(
        &self,
        episode_id: Uuid,
        stage: ProcessingStage,
        now: DateTime<Utc>,
        set_processing_started_at: bool,
    ) -> Result<()>;

    /// Appends one entry to the episode's `stage_history` array.
    async fn append_stage_history(&self, episode_id: Uuid, entry: StageHistoryEntry) -> Result<()>;

    /// Overwrites the episode's `metadata` column, used when the
    /// synthesizer reconstructs voice selections for a replayed message
    /// that predates this field being populated.
    async fn update_episode_metadata(&self, episode_id: Uuid, metadata: &EpisodeMetadata) -> Result<()>;
}
