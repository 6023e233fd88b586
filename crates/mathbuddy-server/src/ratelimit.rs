//! Request throttling.
//!
//! A fixed-window counter per API key. The window state lives in process
//! memory, same as the sessions it protects; a restart clears both. Clients
//! that exceed the allowance get `429 Too Many Requests` with a `Retry-After`
//! header saying when the window reopens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::api::{ErrorResponse, API_KEY_HEADER};
use crate::config::RateLimitConfig;

/// Key under which clients without an API key are counted.
const ANONYMOUS_KEY: &str = "anonymous";

/// A fixed-window request counter keyed by API key.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, WindowState>>,
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    started: Instant,
    count: u32,
}

/// Outcome of counting a request against the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request is within the window allowance.
    Allowed,
    /// Request exceeded the allowance; retry after the given seconds.
    Limited {
        /// Seconds until the window reopens.
        retry_after_secs: u64,
    },
}

impl RateLimiter {
    /// Creates a limiter from configuration.
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_seconds),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts a request for the key and decides whether it may proceed.
    pub fn record(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        // Fail open if a panicking thread poisoned the lock.
        let Ok(mut windows) = self.windows.lock() else {
            return RateDecision::Allowed;
        };
        let state = windows.entry(key.to_string()).or_insert(WindowState {
            started: now,
            count: 0,
        });
        if now.duration_since(state.started) >= self.window {
            state.started = now;
            state.count = 0;
        }
        state.count += 1;
        if state.count > self.max_requests {
            let elapsed = now.duration_since(state.started);
            let retry_after_secs = self.window.saturating_sub(elapsed).as_secs().max(1);
            RateDecision::Limited { retry_after_secs }
        } else {
            RateDecision::Allowed
        }
    }
}

/// Axum middleware enforcing the limiter on every request it wraps.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(ANONYMOUS_KEY)
        .to_string();

    match limiter.record(&key) {
        RateDecision::Allowed => next.run(request).await,
        RateDecision::Limited { retry_after_secs } => {
            warn!(retry_after_secs, "request rate limited");
            let body = Json(ErrorResponse {
                error: "too many requests".to_string(),
            });
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response()
        }
    }
}
