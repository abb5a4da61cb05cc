//! Private message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AuthorRef;
use crate::errors::{AppError, Result};

/// Maximum message length in characters.
pub const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: AuthorRef,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Set once the recipient has opened the conversation.
    pub read: bool,
}

/// One row of the conversation list, seen from one participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub participant: AuthorRef,
    pub last_message: Message,
    pub unread_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationThread {
    pub id: String,
    pub participant: AuthorRef,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFeed {
    pub unread_count: usize,
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    #[serde(default)]
    pub q: Option<String>,
}

fn validate_message(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "Message exceeds {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

/// Request body for starting or continuing a conversation with a member.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub recipient_id: String,
    pub body: String,
}

impl SendMessageRequest {
    pub fn validate(&self) -> Result<()> {
        if self.recipient_id.trim().is_empty() {
            return Err(AppError::Validation("Recipient is required".to_string()));
        }
        validate_message(&self.body)
    }
}

/// Request body for answering inside an existing conversation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMessageRequest {
    pub body: String,
}

impl ReplyMessageRequest {
    pub fn validate(&self) -> Result<()> {
        validate_message(&self.body)
    }
}
