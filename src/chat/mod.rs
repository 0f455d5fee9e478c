use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::error::{PipelineError, Result};
use crate::workers::collector::{ChatPlatformClient, RawMessage};

/// Talks to a sidecar bridge service that holds the authenticated MTProto
/// session (no Rust MTProto client exists to embed directly; see
/// DESIGN.md). The bridge exposes a small REST surface mirroring this
/// pipeline's other external collaborators: one endpoint to confirm the
/// session is live, one to fetch a channel's messages in a date range.
pub struct TelegramBridgeClient {
    client: reqwest::Client,
    bridge_url: String,
    api_id: Option<String>,
    api_hash: Option<String>,
    session: Option<String>,
}

impl TelegramBridgeClient {
    pub fn new(
        bridge_url: impl Into<String>,
        api_id: Option<String>,
        api_hash: Option<String>,
        session: Option<String>,
    ) -> Self {
        TelegramBridgeClient {
            client: reqwest::Client::new(),
            bridge_url: bridge_url.into(),
            api_id,
            api_hash,
            session,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[async_trait]
impl ChatPlatformClient for TelegramBridgeClient {
    async fn authenticate(&self) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/session/verify", self.bridge_url))
            .json(&json!({
                "api_id": self.api_id,
                "api_hash": self.api_hash,
                "session": self.session,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::fatal_external(format!(
                "telegram bridge session rejected: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn fetch_messages(
        &self,
        channel: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>> {
        let response = self
            .client
            .post(format!("{}/messages/fetch", self.bridge_url))
            .json(&json!({
                "channel": channel,
                "since": since,
                "until": until,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::transient_local(format!(
                "telegram bridge fetch failed: {}",
                response.status()
            )));
        }

        let parsed: FetchResponse = response.json().await?;
        Ok(parsed.messages)
    }
}
