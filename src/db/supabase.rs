use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::{
    Episode, EpisodeMetadata, PodcastConfiguration, ProcessingLog, ProcessingStage, StageHistoryEntry,
};
use crate::error::{retry_transient, PipelineError, Result};

use super::Database;

const REQUEST_RETRY_ATTEMPTS: u32 = 3;

/// Talks to Supabase's PostgREST surface directly over HTTP rather than
/// through a Postgres wire driver: every table read is a `GET
/// .../rest/v1/<table>?...` and every mutation goes through a stored
/// procedure exposed at `.../rest/v1/rpc/<name>`.
pub struct SupabaseDatabase {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseDatabase {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        SupabaseDatabase {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            service_key: service_key.into(),
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("apikey", self.service_key.clone()),
            ("Authorization", format!("Bearer {}", self.service_key)),
            ("Content-Type", "application/json".to_string()),
        ]
    }

    async fn rpc(&self, name: &str, body: Value) -> Result<Value> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, name);
        retry_transient(REQUEST_RETRY_ATTEMPTS, || async {
            let mut req = self.client.post(&url).json(&body);
            for (k, v) in self.headers() {
                req = req.header(k, v);
            }
            let response = req.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(PipelineError::transient_local(format!(
                    "rpc {} failed: {} {}",
                    name, status, text
                )));
            }
            response.json().await.map_err(PipelineError::from)
        })
        .await
    }

    async fn select_one(&self, table: &str, filter: &str) -> Result<Value> {
        let url = format!(
            "{}/rest/v1/{}?{}&select=*",
            self.base_url, table, filter
        );
        retry_transient(REQUEST_RETRY_ATTEMPTS, || async {
            let mut req = self.client.get(&url);
            for (k, v) in self.headers() {
                req = req.header(k, v);
            }
            let response = req.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(PipelineError::transient_local(format!(
                    "select {} failed: {} {}",
                    table, status, text
                )));
            }
            let mut rows: Vec<Value> = response.json().await?;
            rows.pop()
                .ok_or_else(|| PipelineError::fatal_external(format!("no row in {}", table)))
        })
        .await
    }

    async fn patch(&self, table: &str, filter: &str, body: Value) -> Result<()> {
        let url = format!("{}/rest/v1/{}?{}", self.base_url, table, filter);
        retry_transient(REQUEST_RETRY_ATTEMPTS, || async {
            let mut req = self.client.patch(&url).json(&body);
            for (k, v) in self.headers() {
                req = req.header(k, v);
            }
            let response = req.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(PipelineError::transient_local(format!(
                    "patch {} failed: {} {}",
                    table, status, text
                )));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl Database for SupabaseDatabase {
    async fn get_episode(&self, episode_id: Uuid) -> Result<Episode> {
        let row = self
            .select_one("episodes", &format!("id=eq.{}", episode_id))
            .await?;
        serde_json::from_value(row).map_err(PipelineError::from)
    }

    async fn get_podcast_config_by_id(&self, config_id: Uuid) -> Result<PodcastConfiguration> {
        let row = self
            .rpc("get_podcast_config_by_id", json!({ "config_id": config_id }))
            .await?;
        serde_json::from_value(row).map_err(PipelineError::from)
    }

    async fn get_podcast_config_by_podcast_id(
        &self,
        podcast_id: Uuid,
    ) -> Result<PodcastConfiguration> {
        let row = self
            .rpc(
                "get_podcast_config_by_podcast_id",
                json!({ "p_podcast_id": podcast_id }),
            )
            .await?;
        serde_json::from_value(row).map_err(PipelineError::from)
    }

    async fn update_episode_status(&self, episode_id: Uuid, new_status: &str) -> Result<()> {
        self.rpc(
            "update_episode_status",
            json!({ "episode_id": episode_id, "new_status": new_status }),
        )
        .await?;
        Ok(())
    }

    async fn update_episode_audio_url(
        &self,
        episode_id: Uuid,
        audio_url: &str,
        new_status: &str,
        duration: i64,
    ) -> Result<()> {
        self.rpc(
            "update_episode_audio_url",
            json!({
                "episode_id": episode_id,
                "audio_url": audio_url,
                "new_status": new_status,
                "duration": duration,
            }),
        )
        .await?;
        Ok(())
    }

    async fn update_episode_script_data(
        &self,
        episode_id: Uuid,
        script_url: &str,
        new_status: &str,
        analysis_data: &Value,
    ) -> Result<()> {
        self.rpc(
            "update_episode_script_data",
            json!({
                "episode_id": episode_id,
                "script_url": script_url,
                "new_status": new_status,
                "analysis_data": analysis_data,
            }),
        )
        .await?;
        Ok(())
    }

    async fn mark_episode_failed(&self, episode_id: Uuid, error_message: &str) -> Result<()> {
        self.rpc(
            "mark_episode_failed",
            json!({ "episode_id": episode_id, "error_message": error_message }),
        )
        .await?;
        Ok(())
    }

    async fn insert_processing_log(&self, log: &ProcessingLog) -> Result<()> {
        let url = format!("{}/rest/v1/episode_processing_logs", self.base_url);
        let mut req = self.client.post(&url).json(log);
        for (k, v) in self.headers() {
            req = req.header(k, v);
        }
        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::soft_warning(format!(
                "insert processing log failed: {} {}",
                status, text
            )));
        }
        Ok(())
    }

    async fn update_episode_stage(
        &self,
        episode_id: Uuid,
        stage: ProcessingStage,
        now: DateTime<Utc>,
        set_processing_started_at: bool,
    ) -> Result<()> {
        let mut body = json!({
            "current_stage": stage,
            "last_stage_update": now,
        });
        if set_processing_started_at {
            body["processing_started_at"] = json!(now);
        }
        self.patch("episodes", &format!("id=eq.{}", episode_id), body)
            .await
    }

    async fn append_stage_history(&self, episode_id: Uuid, entry: StageHistoryEntry) -> Result<()> {
        let episode = self.get_episode(episode_id).await?;
        let mut history = episode.stage_history;
        history.push(entry);
        self.patch(
            "episodes",
            &format!("id=eq.{}", episode_id),
            json!({ "stage_history": history }),
        )
        .await
    }

    async fn update_episode_metadata(&self, episode_id: Uuid, metadata: &EpisodeMetadata) -> Result<()> {
        self.patch(
            "episodes",
            &format!("id=eq.{}", episode_id),
            json!({ "metadata": metadata }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_include_service_key() {
        let db = SupabaseDatabase::new("https://example.supabase.co", "secret");
        let headers = db.headers();
        assert!(headers
            .iter()
            .any(|(k, v)| *k == "apikey" && v == "secret"));
        assert!(headers
            .iter()
            .any(|(k, v)| *k == "Authorization" && v == "Bearer secret"));
    }
}
