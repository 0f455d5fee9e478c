pub mod s3;

use async_trait::async_trait;

use crate::error::Result;

pub use s3::{keys, S3BlobStore};

/// Blob read/write access to the object store holding raw content,
/// transcripts, scripts and rendered audio, keyed by the layout in §6
/// (`podcasts/{podcast_id}/{episode_id}/...`).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
}
