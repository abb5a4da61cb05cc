//! Fixed-window action limiter keyed by member and action kind.
//!
//! Each key gets `limit` attempts per window. The window starts on the first
//! attempt and resets once it has fully elapsed.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    CreateTopic,
    CreateReply,
    SubmitReport,
    SendMessage,
}

impl ActionKind {
    fn label(self) -> &'static str {
        match self {
            ActionKind::CreateTopic => "topics",
            ActionKind::CreateReply => "replies",
            ActionKind::SubmitReport => "reports",
            ActionKind::SendMessage => "messages",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<(String, ActionKind), Window>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            windows: DashMap::new(),
        }
    }

    pub fn attempt(&self, user_id: &str, action: ActionKind) -> RateDecision {
        self.attempt_at(user_id, action, Instant::now())
    }

    pub fn attempt_at(&self, user_id: &str, action: ActionKind, now: Instant) -> RateDecision {
        let mut entry = self
            .windows
            .entry((user_id.to_string(), action))
            .or_insert(Window {
                started: now,
                count: 0,
            });
        let window = entry.value_mut();

        if now.saturating_duration_since(window.started) >= self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        if window.count >= self.limit {
            let elapsed = now.saturating_duration_since(window.started);
            return RateDecision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }

        window.count += 1;
        RateDecision::Allowed {
            remaining: self.limit - window.count,
        }
    }

    /// Consumes one attempt or fails with [`AppError::RateLimited`].
    pub fn check(&self, user_id: &str, action: ActionKind) -> Result<()> {
        match self.attempt(user_id, action) {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Limited { retry_after } => {
                // Round up so clients never retry early.
                let retry_after_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                tracing::warn!(user_id, ?action, retry_after_secs, "rate limit reached");
                Err(AppError::RateLimited {
                    message: format!(
                        "You can post at most {} {} per {} seconds",
                        self.limit,
                        action.label(),
                        self.window.as_secs()
                    ),
                    retry_after_secs,
                })
            }
        }
    }

    /// Drops windows that have fully elapsed.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let window = self.window;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < window);
    }
}
