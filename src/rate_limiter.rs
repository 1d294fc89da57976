//! Fixed-window request rate limiting
//!
//! Tracks one window per client key. A key's window starts on its first
//! request and resets once the window duration has fully elapsed; requests
//! beyond the per-window maximum are rejected until then.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

struct WindowState {
    started: Instant,
    count: usize,
}

/// Per-key fixed-window rate limiter
///
/// Clones share the same window table.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, WindowState>>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window` for each key
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Records a request for `key` and reports whether it is admitted
    pub async fn try_acquire(&self, key: &str) -> bool {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();

        let state = windows.entry(key.to_string()).or_insert(WindowState {
            started: now,
            count: 0,
        });
        if now.duration_since(state.started) >= self.window {
            state.started = now;
            state.count = 0;
        }

        if state.count >= self.max_requests {
            warn!("rate limit exceeded for {}", key);
            return false;
        }
        state.count += 1;
        true
    }
}
