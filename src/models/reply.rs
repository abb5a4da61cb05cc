//! Reply model, quote snapshots and attachment metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::topic::validate_body;
use super::AuthorRef;
use crate::errors::{AppError, Result};
use crate::forum::VoteState;

/// Maximum attachments on one reply.
pub const MAX_ATTACHMENTS: usize = 5;

/// Frozen excerpt of a reply, copied at quote time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSnapshot {
    pub id: String,
    pub author: String,
    pub excerpt: String,
}

/// Uploaded file metadata. The bytes live with the upload collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// A reply in a topic's reply tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub topic_id: String,
    pub author: AuthorRef,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Back-reference used for insertion routing only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_reply: Option<QuoteSnapshot>,
    /// Owned children, in insertion order.
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl Reply {
    pub fn new(id: String, topic_id: String, author: AuthorRef, body: String, at: DateTime<Utc>) -> Self {
        Self {
            id,
            topic_id,
            author,
            body,
            created_at: at,
            updated_at: None,
            parent_id: None,
            quoted_reply: None,
            children: Vec::new(),
            attachments: Vec::new(),
            hidden: false,
            deleted: false,
        }
    }
}

/// Request body for posting a reply (`submitReply`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplyRequest {
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Reply id to quote; the snapshot is captured when the reply is accepted.
    #[serde(default)]
    pub quote_of: Option<String>,
}

impl CreateReplyRequest {
    pub fn validate(&self) -> Result<()> {
        validate_body(&self.body)?;
        if self.attachments.len() > MAX_ATTACHMENTS {
            return Err(AppError::Validation(format!(
                "At most {} attachments per reply",
                MAX_ATTACHMENTS
            )));
        }
        if self.attachments.iter().any(|a| a.file_name.trim().is_empty()) {
            return Err(AppError::Validation(
                "Attachment file name is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Request body for editing a reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReplyRequest {
    pub body: String,
}

impl UpdateReplyRequest {
    pub fn validate(&self) -> Result<()> {
        validate_body(&self.body)
    }
}

/// A reply with derived per-viewer fields and its rendered children.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    #[serde(flatten)]
    pub reply: Reply,
    pub depth: usize,
    pub score: i64,
    pub user_vote: VoteState,
    pub can_reply: bool,
    pub replies: Vec<ReplyView>,
}
