use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use regex::Regex;

/// Process-wide continuous-refill limiter for the TTS API, in front of
/// every chunk's synthesize call regardless of which worker issues it.
/// `governor`'s GCRA implementation gives the same continuous-refill
/// behavior the source system hand-rolled with a token bucket and a sleep
/// loop, without needing to reimplement it.
pub struct TtsRateLimiter {
    inner: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl TtsRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute.max(1)).unwrap();
        let quota = Quota::per_minute(per_minute);
        TtsRateLimiter {
            inner: RateLimiter::direct(quota),
        }
    }

    /// Blocks until a token is available.
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }
}

/// Extracts a retry-after delay (in seconds) from the remote service's
/// error text, which reports it as a gRPC `RetryInfo` embedded in the
/// message body rather than as a structured field, e.g. `retryDelay:
/// "42s"`. Falls back to `default_delay` when no match is found.
pub fn parse_retry_delay(error_message: &str, default_delay: Duration) -> Duration {
    let re = Regex::new(r#"(?i)retryDelay['"]?:?\s*['"]?(\d+)s"#).unwrap();
    re.captures(error_message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_retry_delay_from_error_text() {
        let message = r#"429 rate limited, details: { retryDelay: "42s" }"#;
        let delay = parse_retry_delay(message, Duration::from_secs(60));
        assert_eq!(delay, Duration::from_secs(42));
    }

    #[test]
    fn parses_retry_delay_case_insensitively_without_quotes() {
        let message = "RETRYDELAY: 17s";
        let delay = parse_retry_delay(message, Duration::from_secs(60));
        assert_eq!(delay, Duration::from_secs(17));
    }

    #[test]
    fn falls_back_to_default_when_no_match() {
        let message = "internal server error";
        let delay = parse_retry_delay(message, Duration::from_secs(60));
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn acquire_does_not_panic_on_fresh_limiter() {
        let limiter = TtsRateLimiter::new(9);
        limiter.acquire().await;
    }
}
