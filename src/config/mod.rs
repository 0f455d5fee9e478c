use std::env;
use std::time::Duration;

/// All external collaborator endpoints and tunables, loaded once at process
/// start. Each loader follows the same parse-or-default idiom: missing or
/// unparsable values fall back to a documented default rather than panicking.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub s3_bucket_name: String,
    pub telegram_api_id: Option<String>,
    pub telegram_api_hash: Option<String>,
    pub telegram_session: Option<String>,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub gemini_api_key: String,
    pub audio_generation_queue_url: String,
    pub script_generation_queue_url: String,
    pub tts_requests_per_minute: u32,
    pub api_base_url: Option<String>,
    pub lambda_callback_secret: Option<String>,
    pub tts_call_timeout: Duration,
    pub chunk_max_chars: usize,
    pub chunk_max_workers: usize,
    pub queue_poll_interval: Duration,
    pub synthesis_invocation_budget: Duration,
}

impl AppConfig {
    /// Reads every variable from the process environment, applying the
    /// defaults documented alongside each one.
    pub fn from_env() -> Self {
        AppConfig {
            s3_bucket_name: env::var("S3_BUCKET_NAME").unwrap_or_default(),
            telegram_api_id: env::var("TELEGRAM_API_ID").ok(),
            telegram_api_hash: env::var("TELEGRAM_API_HASH").ok(),
            telegram_session: env::var("TELEGRAM_SESSION").ok(),
            supabase_url: env::var("SUPABASE_URL").unwrap_or_default(),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY").unwrap_or_default(),
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            audio_generation_queue_url: env::var("AUDIO_GENERATION_QUEUE_URL").unwrap_or_default(),
            script_generation_queue_url: env::var("SCRIPT_GENERATION_QUEUE_URL")
                .unwrap_or_default(),
            tts_requests_per_minute: parse_env_or("TTS_REQUESTS_PER_MINUTE", 9),
            api_base_url: env::var("API_BASE_URL").ok(),
            lambda_callback_secret: env::var("LAMBDA_CALLBACK_SECRET").ok(),
            tts_call_timeout: Duration::from_secs(parse_env_or("TTS_CALL_TIMEOUT_SECONDS", 480)),
            chunk_max_chars: parse_env_or("CHUNK_MAX_CHARS", 1200),
            chunk_max_workers: parse_env_or("CHUNK_MAX_WORKERS", 2),
            queue_poll_interval: Duration::from_secs(parse_env_or(
                "QUEUE_POLL_INTERVAL_SECONDS",
                5,
            )),
            synthesis_invocation_budget: Duration::from_secs(parse_env_or(
                "SYNTHESIS_INVOCATION_BUDGET_SECONDS",
                900,
            )),
        }
    }
}

/// Parses an env var into `T`, falling back to `default` when the variable is
/// absent or fails to parse (never panics on bad operator input).
fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable mutation is process-global; serialize tests that
    // touch it so they don't race under the default multi-threaded runner.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn tts_requests_per_minute_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("TTS_REQUESTS_PER_MINUTE");
        assert_eq!(parse_env_or::<u32>("TTS_REQUESTS_PER_MINUTE", 9), 9);
    }

    #[test]
    fn tts_requests_per_minute_custom() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("TTS_REQUESTS_PER_MINUTE", "15");
        assert_eq!(parse_env_or::<u32>("TTS_REQUESTS_PER_MINUTE", 9), 15);
        env::remove_var("TTS_REQUESTS_PER_MINUTE");
    }

    #[test]
    fn invalid_value_falls_back_to_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("CHUNK_MAX_CHARS", "not-a-number");
        assert_eq!(parse_env_or::<usize>("CHUNK_MAX_CHARS", 1200), 1200);
        env::remove_var("CHUNK_MAX_CHARS");
    }

    #[test]
    fn tts_call_timeout_default_matches_spec() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("TTS_CALL_TIMEOUT_SECONDS");
        let config = AppConfig::from_env();
        assert_eq!(config.tts_call_timeout, Duration::from_secs(480));
    }

    #[test]
    fn queue_poll_interval_custom() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("QUEUE_POLL_INTERVAL_SECONDS", "2");
        let config = AppConfig::from_env();
        assert_eq!(config.queue_poll_interval, Duration::from_secs(2));
        env::remove_var("QUEUE_POLL_INTERVAL_SECONDS");
    }
}
