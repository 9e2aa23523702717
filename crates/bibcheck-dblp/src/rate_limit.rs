//! Request pacing for DBLP.
//!
//! Every request waits for a governor permit first, which spaces requests at
//! the configured rate. A 429 is not retried: the lookup fails for that entry
//! and every later request waits out the server's `Retry-After` delay (capped
//! at the request timeout).

use std::sync::Mutex;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use tokio::time::Instant;

use bibcheck_core::LookupError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Delay used when a 429 carries no usable `Retry-After`.
const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

pub struct RequestPacer {
    limiter: DirectLimiter,
    max_backoff: Duration,
    /// No request is sent before this instant.
    resume_at: Mutex<Option<Instant>>,
}

impl RequestPacer {
    /// Allow `n` requests per second. Zero is treated as one.
    pub fn per_second(n: u32, max_backoff: Duration) -> Self {
        let period = Duration::from_millis((1000 / u64::from(n.max(1))).max(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(std::num::NonZeroU32::MIN));
        Self {
            limiter: DirectLimiter::direct(quota),
            max_backoff,
            resume_at: Mutex::new(None),
        }
    }

    /// Wait until a request may be sent.
    pub async fn acquire(&self) {
        let resume_at = self.resume_at.lock().ok().and_then(|slot| *slot);
        if let Some(at) = resume_at {
            tokio::time::sleep_until(at).await;
        }
        self.limiter.until_ready().await;
    }

    /// Hold later requests back after a 429. Returns the delay applied.
    pub fn hold_off(&self, retry_after: Option<Duration>) -> Duration {
        let delay = retry_after.unwrap_or(DEFAULT_BACKOFF).min(self.max_backoff);
        let at = Instant::now() + delay;
        if let Ok(mut slot) = self.resume_at.lock() {
            if slot.is_none_or(|current| current < at) {
                *slot = Some(at);
            }
        }
        delay
    }
}

/// Map a response status to a lookup error, extracting `Retry-After` on 429.
pub fn check_status(status: StatusCode, headers: &HeaderMap) -> Result<(), LookupError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        return Err(LookupError::RateLimited { retry_after });
    }
    if !status.is_success() {
        return Err(LookupError::Status {
            status: status.as_u16(),
        });
    }
    Ok(())
}

/// Parse a Retry-After header value (seconds or HTTP-date).
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // HTTP-date: use a conservative fixed delay rather than parsing it
    if value.contains(',') || value.contains("GMT") {
        return Some(Duration::from_secs(5));
    }
    None
}
