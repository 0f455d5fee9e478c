pub mod sqs;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub use sqs::SqsQueue;

/// One received message plus its receipt handle, needed to acknowledge or
/// leave it for redelivery.
pub struct ReceivedMessage<T> {
    pub body: T,
    pub receipt_handle: String,
}

/// Durable FIFO-ish delivery for the three pipeline queues (collect,
/// preprocess, synthesize). The concrete adapter talks to an SQS-compatible
/// REST endpoint.
#[async_trait]
pub trait Queue<T>: Send + Sync
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn receive(&self, max_messages: u32) -> Result<Vec<ReceivedMessage<T>>>;
    async fn delete(&self, receipt_handle: &str) -> Result<()>;
    async fn send(&self, body: &T) -> Result<()>;
}
