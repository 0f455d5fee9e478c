use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::db::Database;
use crate::domain::{CollectMessage, PodcastConfiguration, PreprocessMessage, ProcessingStage};
use crate::error::{PipelineError, Result};
use crate::logging::log_invocation;
use crate::queue::Queue;
use crate::storage::{keys, BlobStore};
use crate::tracker::EpisodeTracker;

/// One message harvested from the configured chat channel, already
/// normalized to the shape the preprocessor expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub text: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub media: Vec<MediaAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub media_type: String,
    pub filename: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Abstraction over the source chat platform. The collector only needs to
/// authenticate once and fetch a channel's messages in a date range; how
/// that's done (bot API, bridge service, MTProto) is an implementation
/// detail of the concrete client.
#[async_trait]
pub trait ChatPlatformClient: Send + Sync {
    async fn authenticate(&self) -> Result<()>;

    async fn fetch_messages(
        &self,
        channel: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>>;
}

const DEFAULT_PROMOTIONAL_KEYWORDS: &[&str] = &["subscribe now", "sponsored", "promo code", "click here"];

/// True if the message text or any attached URL looks promotional or
/// points at a blocked domain.
fn is_allowed(message: &RawMessage, blocked_domains: &[String]) -> bool {
    let text_lower = message.text.to_lowercase();
    if DEFAULT_PROMOTIONAL_KEYWORDS
        .iter()
        .any(|kw| text_lower.contains(kw))
    {
        return false;
    }
    for url in &message.urls {
        let url_lower = url.to_lowercase();
        if blocked_domains.iter().any(|d| url_lower.contains(&d.to_lowercase())) {
            return false;
        }
    }
    true
}

#[derive(Debug, Serialize)]
struct ContentSummary {
    total_messages: usize,
    channels: Vec<String>,
    date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    media_downloaded: usize,
    urls_seen: usize,
}

#[derive(Debug, Serialize)]
struct ContentDocument {
    messages: Vec<RawMessage>,
    summary: ContentSummary,
}

/// Collects source-channel content for one episode and enqueues it for
/// preprocessing. Implements `telegram_queued -> telegram_processing ->
/// telegram_completed|telegram_failed`.
pub struct CollectorWorker {
    db: Arc<dyn Database>,
    blobs: Arc<dyn BlobStore>,
    tracker: Arc<EpisodeTracker>,
    chat: Arc<dyn ChatPlatformClient>,
    preprocess_queue: Arc<dyn Queue<PreprocessMessage>>,
}

impl CollectorWorker {
    pub fn new(
        db: Arc<dyn Database>,
        blobs: Arc<dyn BlobStore>,
        tracker: Arc<EpisodeTracker>,
        chat: Arc<dyn ChatPlatformClient>,
        preprocess_queue: Arc<dyn Queue<PreprocessMessage>>,
    ) -> Self {
        CollectorWorker {
            db,
            blobs,
            tracker,
            chat,
            preprocess_queue,
        }
    }

    pub async fn handle(&self, message: CollectMessage) -> Result<()> {
        let episode_id = message.episode_id;

        let episode = self.db.get_episode(episode_id).await?;
        if episode.is_past(ProcessingStage::TelegramCompleted) {
            tracing::info!(%episode_id, "collector: episode already past telegram_completed, skipping");
            return Ok(());
        }

        log_invocation(episode_id, ProcessingStage::TelegramProcessing, || {
            self.run(&message)
        })
        .await
    }

    async fn run(&self, message: &CollectMessage) -> Result<()> {
        let episode_id = message.episode_id;

        self.tracker
            .log_stage_start(episode_id, ProcessingStage::TelegramProcessing, json!({}))
            .await;

        let result = self.collect(message).await;

        match &result {
            Ok(()) => {
                self.tracker
                    .log_stage_complete(episode_id, ProcessingStage::TelegramCompleted, json!({}))
                    .await;
            }
            Err(err) => {
                self.tracker
                    .log_stage_failure(episode_id, ProcessingStage::TelegramProcessing, err, json!({}))
                    .await;
            }
        }

        result
    }

    async fn collect(&self, message: &CollectMessage) -> Result<()> {
        let episode_id = message.episode_id;
        let podcast_id = message.podcast_id;

        self.chat.authenticate().await?;

        let config: PodcastConfiguration = self
            .db
            .get_podcast_config_by_id(message.podcast_config_id)
            .await?;

        let channel = message
            .telegram_channel
            .clone()
            .or_else(|| Some(config.content_source.clone()))
            .ok_or_else(|| PipelineError::validation("no channel configured for collection"))?;

        let (since, until) = match message.date_range.or(config.date_range) {
            Some((since, until)) => (since, until),
            None => {
                let hours = config.telegram_hours.unwrap_or(24);
                let until = Utc::now();
                let since = until - chrono::Duration::hours(hours as i64);
                (since, until)
            }
        };

        let raw_messages = self.chat.fetch_messages(&channel, since, until).await?;

        let allowed: Vec<RawMessage> = raw_messages
            .into_iter()
            .filter(|m| is_allowed(m, &config.filtered_domains))
            .collect();

        let mut media_downloaded = 0usize;
        for message_item in &allowed {
            for attachment in &message_item.media {
                if !config.media_types.iter().any(|t| t == &attachment.media_type) {
                    continue;
                }
                let key = keys::media(
                    &podcast_id.to_string(),
                    &episode_id.to_string(),
                    &attachment.media_type,
                    &attachment.filename,
                );
                self.blobs
                    .put(&key, attachment.bytes.clone(), "application/octet-stream")
                    .await?;
                media_downloaded += 1;
            }
        }

        let urls_seen: usize = allowed.iter().map(|m| m.urls.len()).sum();
        let channels: Vec<String> = allowed
            .iter()
            .filter_map(|m| m.channel.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let document = ContentDocument {
            summary: ContentSummary {
                total_messages: allowed.len(),
                channels,
                date_range: Some((since, until)),
                media_downloaded,
                urls_seen,
            },
            messages: allowed,
        };

        let body = serde_json::to_vec(&document).map_err(PipelineError::from)?;
        let content_key = keys::content(&podcast_id.to_string(), &episode_id.to_string());
        self.blobs.put(&content_key, body, "application/json").await?;

        self.db
            .update_episode_status(episode_id, "content_collected")
            .await?;

        self.preprocess_queue
            .send(&PreprocessMessage {
                podcast_config_id: message.podcast_config_id,
                podcast_id,
                episode_id,
                s3_path: content_key,
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str, urls: Vec<&str>) -> RawMessage {
        RawMessage {
            text: text.to_string(),
            date: Utc::now(),
            channel: Some("chan".to_string()),
            urls: urls.into_iter().map(|s| s.to_string()).collect(),
            media: Vec::new(),
        }
    }

    #[test]
    fn promotional_keyword_is_blocked() {
        let m = message("Subscribe now for a discount!", vec![]);
        assert!(!is_allowed(&m, &[]));
    }

    #[test]
    fn blocked_domain_url_is_blocked() {
        let m = message("check this out", vec!["https://spammy.example.com/x"]);
        assert!(!is_allowed(&m, &["spammy.example.com".to_string()]));
    }

    #[test]
    fn ordinary_message_is_allowed() {
        let m = message("today's weather is nice", vec!["https://news.example.com/a"]);
        assert!(is_allowed(&m, &["spammy.example.com".to_string()]));
    }
}
