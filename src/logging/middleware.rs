use std::future::Future;
use std::time::Instant;
use uuid::Uuid;

use crate::domain::ProcessingStage;
use crate::error::PipelineError;

/// Correlates every log line produced while handling one queue message.
#[derive(Clone, Debug)]
pub struct InvocationId(pub String);

impl InvocationId {
    pub fn new() -> Self {
        InvocationId(Uuid::new_v4().to_string())
    }
}

/// Runs `f`, logging start/completion/failure to the access log the way the
/// HTTP layer this was adapted from logged request/response pairs — one
/// structured line per invocation, plus a slow-invocation warning.
pub async fn log_invocation<F, Fut, T>(
    episode_id: Uuid,
    stage: ProcessingStage,
    f: F,
) -> Result<T, PipelineError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let invocation_id = InvocationId::new();
    let start = Instant::now();

    tracing::info!(
        target: "access_log",
        invocation_id = %invocation_id.0,
        episode_id = %episode_id,
        stage = ?stage,
        "stage invocation started"
    );

    let result = f().await;
    let duration = start.elapsed();

    match &result {
        Ok(_) => {
            tracing::info!(
                target: "access_log",
                invocation_id = %invocation_id.0,
                episode_id = %episode_id,
                stage = ?stage,
                duration_ms = duration.as_millis() as u64,
                outcome = "ok",
                "stage invocation completed"
            );
        }
        Err(err) => {
            tracing::warn!(
                target: "access_log",
                invocation_id = %invocation_id.0,
                episode_id = %episode_id,
                stage = ?stage,
                duration_ms = duration.as_millis() as u64,
                outcome = err.kind_name(),
                error = %err,
                "stage invocation failed"
            );
        }
    }

    let slow_threshold_ms = std::env::var("LOG_SLOW_REQUEST_THRESHOLD_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5000);

    if duration.as_millis() as u64 > slow_threshold_ms {
        tracing::warn!(
            invocation_id = %invocation_id.0,
            episode_id = %episode_id,
            stage = ?stage,
            duration_ms = duration.as_millis() as u64,
            threshold_ms = slow_threshold_ms,
            "slow stage invocation detected"
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_ids_are_unique() {
        let a = InvocationId::new();
        let b = InvocationId::new();
        assert_ne!(a.0, b.0);
        assert_eq!(a.0.len(), 36);
    }

    #[tokio::test]
    async fn log_invocation_returns_inner_result() {
        let episode_id = Uuid::new_v4();
        let ok: Result<u32, PipelineError> =
            log_invocation(episode_id, ProcessingStage::ScriptProcessing, || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<u32, PipelineError> = log_invocation(episode_id, ProcessingStage::ScriptProcessing, || async {
            Err(PipelineError::validation("bad input"))
        })
        .await;
        assert!(err.is_err());
    }
}
