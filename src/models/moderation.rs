//! Moderation actions and content reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthorRef, Reply, Topic};
use crate::errors::{AppError, Result};

/// Maximum length of free-text report details.
pub const MAX_REPORT_DETAILS_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Topic,
    Reply,
}

/// Moderator action on a topic or reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ModerationAction {
    Lock,
    Unlock,
    Pin,
    Unpin,
    Hide,
    Show,
    #[serde(rename_all = "camelCase")]
    Move { category_id: String },
    Delete {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ModerationAction {
    /// Lock, pin and move only make sense on topics.
    pub fn is_topic_only(&self) -> bool {
        matches!(
            self,
            ModerationAction::Lock
                | ModerationAction::Unlock
                | ModerationAction::Pin
                | ModerationAction::Unpin
                | ModerationAction::Move { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModerationAction::Lock => "lock",
            ModerationAction::Unlock => "unlock",
            ModerationAction::Pin => "pin",
            ModerationAction::Unpin => "unpin",
            ModerationAction::Hide => "hide",
            ModerationAction::Show => "show",
            ModerationAction::Move { .. } => "move",
            ModerationAction::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReportReason {
    Spam,
    Harassment,
    HateSpeech,
    Inappropriate,
    Misinformation,
    Copyright,
    OffTopic,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportResolution {
    Approve,
    Dismiss,
    Hide,
}

/// A member's report against a topic or reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub content_type: ContentType,
    pub content_id: String,
    pub topic_id: String,
    pub reporter: AuthorRef,
    pub reason: ReportReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ReportResolution>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Request body for submitting a report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub content_type: ContentType,
    pub content_id: String,
    pub reason: ReportReason,
    #[serde(default)]
    pub details: Option<String>,
}

impl CreateReportRequest {
    pub fn validate(&self) -> Result<()> {
        if self.content_id.trim().is_empty() {
            return Err(AppError::Validation("Content id is required".to_string()));
        }
        if self.reason == ReportReason::Other
            && self.details.as_deref().map_or(true, |d| d.trim().is_empty())
        {
            return Err(AppError::Validation(
                "Details are required when the reason is other".to_string(),
            ));
        }
        if self
            .details
            .as_deref()
            .is_some_and(|d| d.chars().count() > MAX_REPORT_DETAILS_CHARS)
        {
            return Err(AppError::Validation(format!(
                "Details exceed {} characters",
                MAX_REPORT_DETAILS_CHARS
            )));
        }
        Ok(())
    }
}

/// Request body for resolving a report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveReportRequest {
    pub resolution: ReportResolution,
}

/// Outcome of a moderator action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationResult {
    pub content_type: ContentType,
    pub content_id: String,
    pub action: String,
    /// The topic after the action, absent once it was deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<Topic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Reply>,
    pub removed: bool,
}

/// Query parameters for the report queue.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub status: Option<ReportStatus>,
}
