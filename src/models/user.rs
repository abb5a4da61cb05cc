//! Forum member model and the author reference embedded in content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

/// Longest ban a moderator may hand out.
pub const MAX_BAN_DAYS: u32 = 365;

/// Maximum length for a ban reason in characters.
pub const MAX_BAN_REASON_CHARS: usize = 500;

/// Role hierarchy, lowest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Moderator,
    Administrator,
}

/// Why and until when an account is banned. No expiry means permanent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ban {
    pub reason: String,
    pub banned_by: String,
    pub banned_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A forum member as known to the mocked user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: UserRole,
    pub active: bool,
    pub banned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban: Option<Ban>,
}

impl User {
    /// Non-owning author reference stored on topics and replies.
    pub fn author_ref(&self) -> AuthorRef {
        AuthorRef {
            id: self.id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }

    pub fn status(&self) -> UserStatus {
        if self.banned {
            UserStatus::Banned
        } else if self.active {
            UserStatus::Active
        } else {
            UserStatus::Inactive
        }
    }

    /// A timed ban that has run out by `now`.
    pub fn ban_expired(&self, now: DateTime<Utc>) -> bool {
        self.banned
            && self
                .ban
                .as_ref()
                .and_then(|b| b.expires_at)
                .is_some_and(|expiry| expiry <= now)
    }
}

/// Author of a topic or reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Banned,
    Inactive,
}

/// Filters for the member directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    /// Case-insensitive match on username or display name.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

impl UserQuery {
    pub fn matches(&self, user: &User) -> bool {
        let text = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let matches_text = text.map_or(true, |q| {
            user.username.to_lowercase().contains(&q)
                || user.display_name.to_lowercase().contains(&q)
        });
        matches_text
            && self.role.map_or(true, |r| r == user.role)
            && self.status.map_or(true, |s| s == user.status())
    }
}

/// Request body for changing a member's role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoleRequest {
    pub role: UserRole,
}

/// Request body for banning a member. Without `durationDays` the ban is permanent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRequest {
    pub reason: String,
    #[serde(default)]
    pub duration_days: Option<u32>,
}

impl BanRequest {
    pub fn validate(&self) -> Result<()> {
        if self.reason.trim().is_empty() {
            return Err(AppError::Validation("Ban reason is required".to_string()));
        }
        if self.reason.chars().count() > MAX_BAN_REASON_CHARS {
            return Err(AppError::Validation(format!(
                "Ban reason exceeds {} characters",
                MAX_BAN_REASON_CHARS
            )));
        }
        if let Some(days) = self.duration_days {
            if days == 0 || days > MAX_BAN_DAYS {
                return Err(AppError::Validation(format!(
                    "Ban duration must be between 1 and {} days",
                    MAX_BAN_DAYS
                )));
            }
        }
        Ok(())
    }
}
