use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::db::Database;
use crate::domain::{ProcessingLog, ProcessingStage, StageHistoryEntry, StageHistoryStatus, StageStatus};
use crate::error::PipelineError;

/// Durable, queryable record of an episode's stage transitions, shared by
/// every worker process. Stage starts/completions/failures are append-only
/// processing-log rows; only `episodes.current_stage` and `stage_history`
/// are mutated in place.
pub struct EpisodeTracker {
    db: Arc<dyn Database>,
    stage_start_times: DashMap<(Uuid, ProcessingStage), chrono::DateTime<Utc>>,
}

impl EpisodeTracker {
    pub fn new(db: Arc<dyn Database>) -> Self {
        EpisodeTracker {
            db,
            stage_start_times: DashMap::new(),
        }
    }

    /// Logs the start of a processing stage. Failures to write are logged
    /// and swallowed — tracking must never block the stage it observes.
    pub async fn log_stage_start(&self, episode_id: Uuid, stage: ProcessingStage, metadata: Value) {
        let now = Utc::now();
        self.stage_start_times.insert((episode_id, stage), now);

        let log = ProcessingLog {
            id: None,
            episode_id,
            stage,
            status: StageStatus::Started,
            started_at: Some(now),
            completed_at: None,
            duration_ms: None,
            error_message: None,
            error_details: None,
            metadata,
            deferred: false,
        };
        if let Err(err) = self.db.insert_processing_log(&log).await {
            tracing::error!(%episode_id, ?stage, error = %err, "failed to insert stage-start processing log");
        }

        let set_processing_started_at =
            matches!(stage, ProcessingStage::Created | ProcessingStage::TelegramQueued);
        if let Err(err) = self
            .db
            .update_episode_stage(episode_id, stage, now, set_processing_started_at)
            .await
        {
            tracing::error!(%episode_id, ?stage, error = %err, "failed to update episode current_stage on start");
        }

        tracing::info!(%episode_id, ?stage, "stage started");
    }

    /// Logs the completion of a processing stage, computing duration from
    /// the cached start time when one exists.
    pub async fn log_stage_complete(&self, episode_id: Uuid, stage: ProcessingStage, metadata: Value) {
        let now = Utc::now();
        let duration_ms = self.take_duration_ms(episode_id, stage, now);

        let log = ProcessingLog {
            id: None,
            episode_id,
            stage,
            status: StageStatus::Completed,
            started_at: None,
            completed_at: Some(now),
            duration_ms,
            error_message: None,
            error_details: None,
            metadata,
            deferred: false,
        };
        if let Err(err) = self.db.insert_processing_log(&log).await {
            tracing::error!(%episode_id, ?stage, error = %err, "failed to insert stage-complete processing log");
        }

        self.append_history(episode_id, stage, StageHistoryStatus::Completed, duration_ms)
            .await;

        if let Err(err) = self
            .db
            .update_episode_stage(episode_id, stage, now, false)
            .await
        {
            tracing::error!(%episode_id, ?stage, error = %err, "failed to update episode current_stage on completion");
        }

        tracing::info!(%episode_id, ?stage, ?duration_ms, "stage completed");
    }

    /// Logs the failure of a processing stage: writes a failed processing
    /// log row, appends to `stage_history`, and marks the episode `failed`
    /// with `current_stage` set to the stage's failure variant.
    pub async fn log_stage_failure(
        &self,
        episode_id: Uuid,
        stage: ProcessingStage,
        error: &PipelineError,
        error_details: Value,
    ) {
        let now = Utc::now();
        let duration_ms = self.take_duration_ms(episode_id, stage, now);

        let log = ProcessingLog {
            id: None,
            episode_id,
            stage,
            status: StageStatus::Failed,
            started_at: None,
            completed_at: Some(now),
            duration_ms,
            error_message: Some(error.to_string()),
            error_details: Some(error_details),
            metadata: Value::Null,
            deferred: false,
        };
        if let Err(err) = self.db.insert_processing_log(&log).await {
            tracing::error!(%episode_id, ?stage, error = %err, "failed to insert stage-failure processing log");
        }

        self.append_history(episode_id, stage, StageHistoryStatus::Failed, duration_ms)
            .await;

        let failed_stage = stage.failed_variant();
        if let Err(err) = self
            .db
            .update_episode_stage(episode_id, failed_stage, now, false)
            .await
        {
            tracing::error!(%episode_id, error = %err, "failed to update episode current_stage on failure");
        }
        if let Err(err) = self.db.mark_episode_failed(episode_id, &error.to_string()).await {
            tracing::error!(%episode_id, error = %err, "failed to mark episode failed");
        }

        tracing::error!(%episode_id, ?stage, error = %error, "stage failed");
    }

    fn take_duration_ms(
        &self,
        episode_id: Uuid,
        stage: ProcessingStage,
        now: chrono::DateTime<Utc>,
    ) -> Option<i64> {
        self.stage_start_times
            .remove(&(episode_id, stage))
            .map(|(_, started_at)| (now - started_at).num_milliseconds())
    }

    async fn append_history(
        &self,
        episode_id: Uuid,
        stage: ProcessingStage,
        status: StageHistoryStatus,
        duration_ms: Option<i64>,
    ) {
        let entry = StageHistoryEntry {
            stage,
            status,
            timestamp: Utc::now(),
            duration_ms,
        };
        if let Err(err) = self.db.append_stage_history(episode_id, entry).await {
            tracing::warn!(%episode_id, error = %err, "could not update stage_history");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    use crate::domain::{Episode, EpisodeMetadata, EpisodeStatus, PodcastConfiguration};

    struct RecordingDb {
        stage_updates: StdMutex<Vec<ProcessingStage>>,
        marked_failed: StdMutex<bool>,
    }

    #[async_trait]
    impl Database for RecordingDb {
        async fn get_episode(&self, _episode_id: Uuid) -> crate::error::Result<Episode> {
            Ok(Episode {
                id: Uuid::nil(),
                podcast_id: Uuid::nil(),
                podcast_config_id: Uuid::nil(),
                status: EpisodeStatus::Processing,
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
                analysis: Default::default(),
                stage_history: Vec::new(),
            })
        }
        async fn get_podcast_config_by_id(&self, _id: Uuid) -> crate::error::Result<PodcastConfiguration> {
            unimplemented!()
        }
        async fn get_podcast_config_by_podcast_id(
            &self,
            _id: Uuid,
        ) -> crate::error::Result<PodcastConfiguration> {
            unimplemented!()
        }
        async fn update_episode_status(&self, _id: Uuid, _s: &str) -> crate::error::Result<()> {
            Ok(())
        }
        async fn update_episode_audio_url(
            &self,
            _id: Uuid,
            _u: &str,
            _s: &str,
            _d: i64,
        ) -> crate::error::Result<()> {
            Ok(())
        }
        async fn update_episode_script_data(
            &self,
            _id: Uuid,
            _u: &str,
            _s: &str,
            _a: &Value,
        ) -> crate::error::Result<()> {
            Ok(())
        }
        async fn mark_episode_failed(&self, _id: Uuid, _m: &str) -> crate::error::Result<()> {
            *self.marked_failed.lock().unwrap() = true;
            Ok(())
        }
        async fn insert_processing_log(&self, _log: &ProcessingLog) -> crate::error::Result<()> {
            Ok(())
        }
        async fn update_episode_stage(
            &self,
            _id: Uuid,
            stage: ProcessingStage,
            _now: chrono::DateTime<Utc>,
            _set_start: bool,
        ) -> crate::error::Result<()> {
            self.stage_updates.lock().unwrap().push(stage);
            Ok(())
        }
        async fn append_stage_history(
            &self,
            _id: Uuid,
            _entry: StageHistoryEntry,
        ) -> crate::error::Result<()> {
            Ok(())
        }
        async fn update_episode_metadata(
            &self,
            _id: Uuid,
            _metadata: &EpisodeMetadata,
        ) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn start_then_complete_clears_cached_start_time() {
        let db = Arc::new(RecordingDb {
            stage_updates: StdMutex::new(Vec::new()),
            marked_failed: StdMutex::new(false),
        });
        let tracker = EpisodeTracker::new(db.clone());
        let episode_id = Uuid::new_v4();

        tracker
            .log_stage_start(episode_id, ProcessingStage::AudioProcessing, Value::Null)
            .await;
        assert!(tracker
            .stage_start_times
            .contains_key(&(episode_id, ProcessingStage::AudioProcessing)));

        tracker
            .log_stage_complete(episode_id, ProcessingStage::AudioProcessing, Value::Null)
            .await;
        assert!(!tracker
            .stage_start_times
            .contains_key(&(episode_id, ProcessingStage::AudioProcessing)));

        assert_eq!(
            *db.stage_updates.lock().unwrap(),
            vec![ProcessingStage::AudioProcessing, ProcessingStage::AudioProcessing]
        );
    }

    #[tokio::test]
    async fn failure_marks_episode_failed_and_uses_failed_variant() {
        let db = Arc::new(RecordingDb {
            stage_updates: StdMutex::new(Vec::new()),
            marked_failed: StdMutex::new(false),
        });
        let tracker = EpisodeTracker::new(db.clone());
        let episode_id = Uuid::new_v4();

        tracker
            .log_stage_start(episode_id, ProcessingStage::AudioProcessing, Value::Null)
            .await;
        let err = PipelineError::fatal_external("tts rejected request");
        tracker
            .log_stage_failure(episode_id, ProcessingStage::AudioProcessing, &err, Value::Null)
            .await;

        assert!(*db.marked_failed.lock().unwrap());
        assert_eq!(
            db.stage_updates.lock().unwrap().last(),
            Some(&ProcessingStage::AudioFailed)
        );
    }
}
