pub mod collector;
pub mod preprocessor;
pub mod synthesizer;

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::queue::Queue;

pub use collector::CollectorWorker;
pub use preprocessor::PreprocessorWorker;
pub use synthesizer::SynthesizerWorker;

/// Repeatedly drains `queue` in batches, handing each message to `handle`
/// and deleting it on success; a message the handler fails is left
/// in-flight for the queue's own redelivery/visibility-timeout mechanism
/// (§5's "batch-item-failure" semantics) instead of being deleted.
pub async fn poll_loop<T, F, Fut>(
    queue: &dyn Queue<T>,
    batch_size: u32,
    poll_interval: Duration,
    handle: F,
) where
    T: Serialize + DeserializeOwned + Send + Sync,
    F: Fn(T) -> Fut,
    Fut: Future<Output = crate::error::Result<()>>,
{
    loop {
        match queue.receive(batch_size).await {
            Ok(messages) => {
                if messages.is_empty() {
                    tokio::time::sleep(poll_interval).await;
                    continue;
                }
                for message in messages {
                    match handle(message.body).await {
                        Ok(()) => {
                            if let Err(err) = queue.delete(&message.receipt_handle).await {
                                tracing::warn!(error = %err, "failed to delete processed queue message");
                            }
                        }
                        Err(err) => {
                            tracing::warn!(
                                error = %err,
                                receipt_handle = %message.receipt_handle,
                                "leaving message for redelivery"
                            );
                        }
                    }
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "queue receive failed");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
