use async_trait::async_trait;

use crate::error::{retry_transient, PipelineError, Result};

use super::BlobStore;

const UPLOAD_RETRY_ATTEMPTS: u32 = 3;

/// S3 exposes a plain REST surface (virtual-hosted-style PUT/GET), so this
/// talks to it directly over `reqwest` rather than depending on the full AWS
/// SDK for a handful of object operations.
pub struct S3BlobStore {
    client: reqwest::Client,
    bucket_url: String,
}

impl S3BlobStore {
    /// `bucket_url` is the fully-resolved endpoint, e.g.
    /// `https://{bucket}.s3.{region}.amazonaws.com`.
    pub fn new(bucket_url: impl Into<String>) -> Self {
        S3BlobStore {
            client: reqwest::Client::new(),
            bucket_url: bucket_url.into(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.bucket_url, key);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::fatal_external(format!(
                "object not found: {} ({})",
                key,
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = format!("{}/{}", self.bucket_url, key);
        retry_transient(UPLOAD_RETRY_ATTEMPTS, || async {
            let response = self
                .client
                .put(&url)
                .header("Content-Type", content_type)
                .body(bytes.clone())
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(PipelineError::transient_local(format!(
                    "upload failed: {} ({})",
                    key,
                    response.status()
                )));
            }
            Ok(())
        })
        .await
    }
}

/// Builds the canonical blob paths described in §6's storage layout.
pub mod keys {
    pub fn content(podcast_id: &str, episode_id: &str) -> String {
        format!("podcasts/{}/{}/content.json", podcast_id, episode_id)
    }

    pub fn clean_content_transcript(podcast_id: &str, episode_id: &str, timestamp: &str) -> String {
        format!(
            "podcasts/{}/{}/transcripts/clean_content_{}.json",
            podcast_id, episode_id, timestamp
        )
    }

    pub fn analysis_transcript(podcast_id: &str, episode_id: &str, timestamp: &str) -> String {
        format!(
            "podcasts/{}/{}/transcripts/analysis_{}.json",
            podcast_id, episode_id, timestamp
        )
    }

    pub fn script_transcript(podcast_id: &str, episode_id: &str, timestamp: &str) -> String {
        format!(
            "podcasts/{}/{}/transcripts/script_{}.txt",
            podcast_id, episode_id, timestamp
        )
    }

    pub fn diacritized_transcript(podcast_id: &str, episode_id: &str, timestamp: &str) -> String {
        format!(
            "podcasts/{}/{}/transcripts/diacritized_{}.txt",
            podcast_id, episode_id, timestamp
        )
    }

    pub fn audio(podcast_id: &str, episode_id: &str) -> String {
        format!("podcasts/{}/{}/audio/podcast.wav", podcast_id, episode_id)
    }

    pub fn media(podcast_id: &str, episode_id: &str, media_type: &str, filename: &str) -> String {
        format!(
            "podcasts/{}/{}/{}/{}",
            podcast_id, episode_id, media_type, filename
        )
    }
}

#[cfg(test)]
mod tests {
    use super::keys;

    #[test]
    fn audio_key_is_canonical_and_overwritable() {
        assert_eq!(
            keys::audio("pod-1", "ep-1"),
            "podcasts/pod-1/ep-1/audio/podcast.wav"
        );
    }

    #[test]
    fn transcript_keys_embed_timestamp() {
        let key = keys::script_transcript("pod-1", "ep-1", "20260101_120000");
        assert_eq!(
            key,
            "podcasts/pod-1/ep-1/transcripts/script_20260101_120000.txt"
        );
    }
}
