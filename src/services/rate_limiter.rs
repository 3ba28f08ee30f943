//! Login rate limiter
//!
//! Five failed attempts for one email within fifteen minutes lock further
//! attempts for that email until the oldest failure leaves the window.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

const MAX_FAILED_ATTEMPTS: usize = 5;
const WINDOW_MINUTES: i64 = 15;

pub struct LoginRateLimiter {
    /// Failed login attempts by lowercased email
    attempts: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    max_attempts: usize,
    window: Duration,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(MAX_FAILED_ATTEMPTS, Duration::minutes(WINDOW_MINUTES))
    }

    pub fn with_limits(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: RwLock::new(HashMap::new()),
            max_attempts,
            window,
        }
    }

    pub async fn is_limited(&self, email: &str) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        match attempts.get_mut(&email.to_lowercase()) {
            Some(times) => {
                times.retain(|time| *time > cutoff);
                times.len() >= self.max_attempts
            }
            None => false,
        }
    }

    pub async fn record_failure(&self, email: &str) {
        let mut attempts = self.attempts.write().await;
        attempts
            .entry(email.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear(&self, email: &str) {
        self.attempts.write().await.remove(&email.to_lowercase());
    }

    /// Drop entries whose attempts have all left the window
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    pub async fn tracked(&self) -> usize {
        self.attempts.read().await.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
