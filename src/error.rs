use serde_json::Value;
use std::fmt;

/// The five-kind error taxonomy that governs how a worker's top-level
/// handler reacts to a failure. Inner components raise these and never
/// mutate episode state directly — only the worker's top-level handler
/// writes status back to the episode.
#[derive(Debug)]
pub enum PipelineError {
    /// Fail fast, mark episode `failed`, log. Never retried.
    Validation { message: String },
    /// Retry in place with exponential backoff (max 3 attempts).
    TransientLocal { message: String },
    /// Return episode to `script_ready`; queue redelivers. Never marks
    /// `failed`. Carries an optional suggested retry-after delay.
    Deferrable {
        message: String,
        retry_after: Option<std::time::Duration>,
    },
    /// Mark episode `failed`; never publish partial audio.
    FatalExternal { message: String },
    /// Attach to processing log; never blocks publication.
    SoftWarning { message: String },

    Io(std::io::Error),
    Wav(String),
    Json(String),
    Http(String),
    TaskJoin(String),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation {
            message: message.into(),
        }
    }

    pub fn transient_local(message: impl Into<String>) -> Self {
        PipelineError::TransientLocal {
            message: message.into(),
        }
    }

    pub fn deferrable(message: impl Into<String>) -> Self {
        PipelineError::Deferrable {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn deferrable_after(message: impl Into<String>, retry_after: std::time::Duration) -> Self {
        PipelineError::Deferrable {
            message: message.into(),
            retry_after: Some(retry_after),
        }
    }

    pub fn fatal_external(message: impl Into<String>) -> Self {
        PipelineError::FatalExternal {
            message: message.into(),
        }
    }

    pub fn soft_warning(message: impl Into<String>) -> Self {
        PipelineError::SoftWarning {
            message: message.into(),
        }
    }

    /// Whether the caller should retry in place (Transient-local only).
    pub fn retriable(&self) -> bool {
        matches!(self, PipelineError::TransientLocal { .. })
    }

    /// Whether this outcome should return the episode to `script_ready`
    /// instead of marking it `failed`.
    pub fn deferrable_kind(&self) -> bool {
        matches!(self, PipelineError::Deferrable { .. })
    }

    /// Structured `details` payload for the processing log: `{kind,
    /// message, retriable, deferrable}`.
    pub fn to_log_details(&self) -> Value {
        serde_json::json!({
            "kind": self.kind_name(),
            "message": self.to_string(),
            "retriable": self.retriable(),
            "deferrable": self.deferrable_kind(),
        })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            PipelineError::Validation { .. } => "validation",
            PipelineError::TransientLocal { .. } => "transient_local",
            PipelineError::Deferrable { .. } => "deferrable",
            PipelineError::FatalExternal { .. } => "fatal_external",
            PipelineError::SoftWarning { .. } => "soft_warning",
            PipelineError::Io(_) => "fatal_external",
            PipelineError::Wav(_) => "fatal_external",
            PipelineError::Json(_) => "fatal_external",
            PipelineError::Http(_) => "transient_local",
            PipelineError::TaskJoin(_) => "fatal_external",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Validation { message } => write!(f, "validation error: {}", message),
            PipelineError::TransientLocal { message } => {
                write!(f, "transient local error: {}", message)
            }
            PipelineError::Deferrable {
                message,
                retry_after,
            } => match retry_after {
                Some(d) => write!(f, "deferred: {} (retry after {}s)", message, d.as_secs()),
                None => write!(f, "deferred: {}", message),
            },
            PipelineError::FatalExternal { message } => write!(f, "fatal error: {}", message),
            PipelineError::SoftWarning { message } => write!(f, "warning: {}", message),
            PipelineError::Io(e) => write!(f, "I/O error: {}", e),
            PipelineError::Wav(msg) => write!(f, "WAV error: {}", msg),
            PipelineError::Json(msg) => write!(f, "JSON error: {}", msg),
            PipelineError::Http(msg) => write!(f, "HTTP error: {}", msg),
            PipelineError::TaskJoin(msg) => write!(f, "task join error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

impl From<hound::Error> for PipelineError {
    fn from(err: hound::Error) -> Self {
        PipelineError::Wav(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Http(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::TaskJoin(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Exponential backoff schedule for `retry_transient`, in seconds.
const TRANSIENT_RETRY_BACKOFF_SECONDS: [u64; 2] = [1, 2];

/// Retries `op` up to `max_attempts` times while it keeps returning
/// `TransientLocal` (§7: "blob upload 5xx, DB connection drop... retry in
/// place with exponential backoff"). Any other error kind propagates on the
/// first attempt without retry.
pub async fn retry_transient<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..max_attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.retriable() => {
                if attempt + 1 < max_attempts {
                    let backoff = TRANSIENT_RETRY_BACKOFF_SECONDS
                        .get(attempt as usize)
                        .copied()
                        .unwrap_or(4);
                    tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
                }
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or_else(|| PipelineError::transient_local("retry budget exhausted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_only_for_transient_local() {
        assert!(PipelineError::transient_local("x").retriable());
        assert!(!PipelineError::deferrable("x").retriable());
        assert!(!PipelineError::fatal_external("x").retriable());
    }

    #[test]
    fn deferrable_kind_only_for_deferrable() {
        assert!(PipelineError::deferrable("x").deferrable_kind());
        assert!(!PipelineError::validation("x").deferrable_kind());
    }

    #[test]
    fn display_includes_retry_after() {
        let err =
            PipelineError::deferrable_after("rate limited", std::time::Duration::from_secs(42));
        assert!(err.to_string().contains("42s"));
    }

    #[test]
    fn log_details_carries_kind_and_flags() {
        let err = PipelineError::fatal_external("chunk retries exhausted");
        let details = err.to_log_details();
        assert_eq!(details["kind"], "fatal_external");
        assert_eq!(details["retriable"], false);
        assert_eq!(details["deferrable"], false);
    }

    #[test]
    fn from_io_error_is_fatal_external_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PipelineError = io_err.into();
        assert_eq!(err.kind_name(), "fatal_external");
    }

    #[tokio::test]
    async fn retry_transient_succeeds_after_transient_failures() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = retry_transient(3, || {
            let attempts = &attempts;
            async move {
                let count = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if count < 2 {
                    Err(PipelineError::transient_local("not yet"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_transient_gives_up_after_max_attempts() {
        let result: Result<()> =
            retry_transient(3, || async { Err(PipelineError::transient_local("down")) }).await;
        assert!(matches!(result, Err(PipelineError::TransientLocal { .. })));
    }

    #[tokio::test]
    async fn retry_transient_propagates_non_transient_immediately() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: Result<()> = retry_transient(3, || {
            let attempts = &attempts;
            async move {
                attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(PipelineError::validation("bad input"))
            }
        })
        .await;
        assert!(matches!(result, Err(PipelineError::Validation { .. })));
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
