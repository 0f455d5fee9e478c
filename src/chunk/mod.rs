pub mod wav;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{PipelineError, Result};

/// Splits a script into an ordered list of chunks, accumulating lines until
/// the next line would push the running buffer past `max_chars`. Overlong
/// single lines are emitted as their own chunk rather than subdivided
/// (policy recorded in the owning module's design notes).
pub fn split(script: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for line in script.lines() {
        let candidate_len = if buffer.is_empty() {
            line.len()
        } else {
            buffer.len() + 1 + line.len()
        };

        if candidate_len > max_chars && !buffer.is_empty() {
            chunks.push(std::mem::take(&mut buffer));
        }

        if buffer.is_empty() {
            buffer.push_str(line);
        } else {
            buffer.push('\n');
            buffer.push_str(line);
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }

    chunks
}

/// One rendered chunk ready for concatenation, ordered by its position in
/// the script.
pub struct RenderedChunk {
    pub chunk_index: usize,
    pub bytes: Vec<u8>,
}

/// Drives synthesis of every chunk through `synthesize`, bounded to
/// `min(chunks.len(), max_workers)` concurrent tasks, tripping a circuit
/// breaker after two consecutive `Deferrable` outcomes (rate-limit
/// backpressure) and aborting the whole run rather than partially
/// publishing. Returns chunks sorted by index, ready for concatenation.
pub async fn render_all<F, Fut>(
    chunks: Vec<String>,
    max_workers: usize,
    synthesize: F,
) -> Result<Vec<RenderedChunk>>
where
    F: Fn(usize, String) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Result<Vec<u8>>> + Send,
{
    if chunks.is_empty() {
        return Err(PipelineError::validation("no chunks to synthesize"));
    }

    let worker_count = max_workers.min(chunks.len()).max(1);
    let semaphore = Arc::new(Semaphore::new(worker_count));
    let consecutive_deferrals = Arc::new(AtomicUsize::new(0));
    let aborted = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let mut handles = Vec::with_capacity(chunks.len());

    for (index, chunk_text) in chunks.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let consecutive_deferrals = consecutive_deferrals.clone();
        let aborted = aborted.clone();
        let synthesize = synthesize.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");

            if aborted.load(Ordering::SeqCst) {
                return (index, Err(PipelineError::deferrable("circuit breaker tripped")));
            }

            let result = synthesize(index, chunk_text).await;

            match &result {
                Ok(_) => {
                    consecutive_deferrals.store(0, Ordering::SeqCst);
                }
                Err(err) if err.deferrable_kind() => {
                    let count = consecutive_deferrals.fetch_add(1, Ordering::SeqCst) + 1;
                    if count >= 2 {
                        aborted.store(true, Ordering::SeqCst);
                    }
                }
                Err(_) => {
                    consecutive_deferrals.store(0, Ordering::SeqCst);
                }
            }

            (index, result)
        }));
    }

    let mut rendered = Vec::with_capacity(handles.len());
    let mut first_error: Option<PipelineError> = None;

    for handle in handles {
        let (index, result) = handle.await?;
        match result {
            Ok(bytes) => rendered.push(RenderedChunk {
                chunk_index: index,
                bytes,
            }),
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    if aborted.load(Ordering::SeqCst) {
        return Err(PipelineError::deferrable(
            "chunk manager circuit breaker tripped after repeated rate-limit deferrals",
        ));
    }

    if let Some(err) = first_error {
        return Err(err);
    }

    rendered.sort_by_key(|c| c.chunk_index);
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn split_accumulates_lines_under_budget() {
        let script = "line one\nline two\nline three";
        let chunks = split(script, 100);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn split_cuts_when_next_line_would_overflow() {
        let script = "aaaaaaaaaa\nbbbbbbbbbb\ncccccccccc";
        let chunks = split(script, 12);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn split_emits_overlong_line_as_its_own_chunk() {
        let long_line = "x".repeat(50);
        let script = format!("short\n{}", long_line);
        let chunks = split(&script, 10);
        assert!(chunks.iter().any(|c| c == &long_line));
    }

    #[tokio::test]
    async fn render_all_returns_chunks_sorted_by_index() {
        let chunks = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let rendered = render_all(chunks, 2, |index, text| async move {
            Ok(format!("{}:{}", index, text).into_bytes())
        })
        .await
        .unwrap();
        let indices: Vec<usize> = rendered.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn render_all_trips_circuit_breaker_after_two_deferrals() {
        let chunks = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let result = render_all(chunks, 1, move |_index, _text| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::deferrable("rate limited"))
            }
        })
        .await;
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), PipelineError::Deferrable { .. }));
    }

    #[tokio::test]
    async fn render_all_rejects_empty_input() {
        let result: Result<Vec<RenderedChunk>> = render_all(vec![], 2, |_i, _t| async { Ok(Vec::new()) }).await;
        assert!(result.is_err());
    }
}
