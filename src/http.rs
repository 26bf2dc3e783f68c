//! Shared HTTP response handling for the tracker and source-control clients.
//!
//! Rate-limit responses (429, or 403 with an exhausted `x-ratelimit-remaining`)
//! surface as [`StageWatchError::RateLimited`] so callers can back off; every
//! other non-success status is a hard [`StageWatchError::Api`] failure.

use std::time::Duration;

use chrono::Utc;
use log::warn;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};

use crate::error::{Result, StageWatchError};

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Bounded retry policy for rate-limited requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first request
    pub max_attempts: u32,
    /// Delay before the first retry when the server gives no hint
    pub base_delay: Duration,
    /// Upper bound for any single wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (zero-based).
    ///
    /// Uses the server hint when present, otherwise doubles `base_delay` per
    /// retry. Always capped at `max_delay`.
    pub fn delay_for(&self, retry: u32, hint_secs: Option<u64>) -> Duration {
        let delay = hint_secs.map_or_else(
            || {
                self.base_delay
                    .saturating_mul(2u32.saturating_pow(retry))
            },
            Duration::from_secs,
        );
        delay.min(self.max_delay)
    }
}

/// Checks a response for rate limiting and other non-success statuses.
pub async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();

    if is_rate_limited(status, response.headers()) {
        return Err(StageWatchError::RateLimited {
            retry_after_secs: rate_limit_hint(response.headers(), Utc::now().timestamp()),
        });
    }

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(StageWatchError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

/// Sends a request, retrying only on rate limiting.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed by
/// `send`. After `policy.max_attempts` rate-limited responses the call fails
/// with [`StageWatchError::ApiErrorAfterRetries`].
pub async fn send_with_retry<F>(policy: &RetryPolicy, endpoint: &str, build: F) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let response = build().send().await?;
        let status = response.status();

        match check_response(response).await {
            Err(StageWatchError::RateLimited { retry_after_secs }) => {
                if attempt >= policy.max_attempts {
                    return Err(StageWatchError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: attempt,
                    });
                }
                let delay = policy.delay_for(attempt - 1, retry_after_secs);
                warn!(
                    "Rate limited by {endpoint} (status {status}). Waiting {}s before retry {}/{}...",
                    delay.as_secs(),
                    attempt,
                    policy.max_attempts - 1
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && headers
            .get(RATE_LIMIT_REMAINING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0")
}

/// Seconds to wait according to `Retry-After`, falling back to the epoch in
/// `x-ratelimit-reset`.
fn rate_limit_hint(headers: &HeaderMap, now_epoch: i64) -> Option<u64> {
    if let Some(secs) = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(secs);
    }

    headers
        .get(RATE_LIMIT_RESET)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|reset| u64::try_from(reset - now_epoch).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_delay_prefers_server_hint() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, Some(5)), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_backs_off_exponentially() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, Some(3600)), Duration::from_secs(60));
        assert_eq!(policy.delay_for(20, None), Duration::from_secs(60));
    }

    #[test]
    fn test_hint_from_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(rate_limit_hint(&headers, 0), Some(120));
    }

    #[test]
    fn test_hint_from_reset_epoch() {
        let mut headers = HeaderMap::new();
        headers.insert(RATE_LIMIT_RESET, HeaderValue::from_static("1700000030"));
        assert_eq!(rate_limit_hint(&headers, 1_700_000_000), Some(30));
    }

    #[test]
    fn test_hint_reset_in_the_past_is_zero() {
        let mut headers = HeaderMap::new();
        headers.insert(RATE_LIMIT_RESET, HeaderValue::from_static("1699999990"));
        assert_eq!(rate_limit_hint(&headers, 1_700_000_000), Some(0));
    }

    #[test]
    fn test_hint_missing() {
        assert_eq!(rate_limit_hint(&HeaderMap::new(), 0), None);
    }

    #[test]
    fn test_forbidden_is_rate_limited_only_when_exhausted() {
        let mut headers = HeaderMap::new();
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, &headers));
        headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from_static("0"));
        assert!(is_rate_limited(StatusCode::FORBIDDEN, &headers));
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()));
    }

    #[tokio::test]
    async fn test_send_with_retry_gives_up_after_max_attempts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/limited")
            .with_status(429)
            .with_header("retry-after", "0")
            .expect(3)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/limited", server.url());
        let result = send_with_retry(&instant_policy(3), "test", || client.get(&url)).await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(StageWatchError::ApiErrorAfterRetries {
                status: 429,
                retries: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_send_with_retry_does_not_retry_hard_failures() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/broken")
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/broken", server.url());
        let result = send_with_retry(&instant_policy(3), "test", || client.get(&url)).await;

        mock.assert_async().await;
        match result {
            Err(StageWatchError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_with_retry_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_body("fine")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/ok", server.url());
        let response = send_with_retry(&instant_policy(3), "test", || client.get(&url))
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "fine");
    }
}
