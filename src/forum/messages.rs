//! Private conversations between two members.
//!
//! Each member pair shares at most one conversation. A message counts as
//! unread for the participant who did not send it until they open the
//! conversation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{AuthorRef, ConversationSummary, ConversationThread, Message, MessageFeed};

type MemberPair = (String, String);

fn pair(a: &str, b: &str) -> MemberPair {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Debug, Clone)]
struct Conversation {
    id: String,
    participants: [AuthorRef; 2],
    messages: Vec<Message>,
}

impl Conversation {
    fn includes(&self, member_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == member_id)
    }

    fn other(&self, member_id: &str) -> &AuthorRef {
        if self.participants[0].id == member_id {
            &self.participants[1]
        } else {
            &self.participants[0]
        }
    }

    fn unread_for(&self, member_id: &str) -> usize {
        self.messages
            .iter()
            .filter(|m| m.sender.id != member_id && !m.read)
            .count()
    }

    fn push(&mut self, sender: &AuthorRef, body: &str, now: DateTime<Utc>) -> Message {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: self.id.clone(),
            sender: sender.clone(),
            body: body.to_string(),
            created_at: now,
            read: false,
        };
        self.messages.push(message.clone());
        message
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageCenter {
    conversations: HashMap<String, Conversation>,
    by_pair: HashMap<MemberPair, String>,
}

impl MessageCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `body` to `recipient`, opening a conversation on first contact.
    pub fn send(
        &mut self,
        sender: &AuthorRef,
        recipient: &AuthorRef,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        if sender.id == recipient.id {
            return Err(AppError::Validation(
                "You cannot send a message to yourself".to_string(),
            ));
        }
        let id = self
            .by_pair
            .entry(pair(&sender.id, &recipient.id))
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        let conversation = self
            .conversations
            .entry(id.clone())
            .or_insert_with(|| Conversation {
                id,
                participants: [sender.clone(), recipient.clone()],
                messages: Vec::new(),
            });
        Ok(conversation.push(sender, body, now))
    }

    /// Appends to a conversation the sender takes part in.
    pub fn reply(
        &mut self,
        sender: &AuthorRef,
        conversation_id: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        let conversation = self.participating_mut(&sender.id, conversation_id)?;
        Ok(conversation.push(sender, body, now))
    }

    /// Conversations of `member_id`, most recent activity first.
    ///
    /// `query` matches the other participant's name or the last message.
    pub fn conversations(&self, member_id: &str, query: Option<&str>) -> Vec<ConversationSummary> {
        let needle = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut rows: Vec<ConversationSummary> = self
            .conversations
            .values()
            .filter(|c| c.includes(member_id))
            .filter_map(|c| {
                let last = c.messages.last()?;
                Some(ConversationSummary {
                    id: c.id.clone(),
                    participant: c.other(member_id).clone(),
                    last_message: last.clone(),
                    unread_count: c.unread_for(member_id),
                })
            })
            .filter(|row| {
                needle.as_deref().map_or(true, |q| {
                    row.participant.display_name.to_lowercase().contains(q)
                        || row.participant.username.to_lowercase().contains(q)
                        || row.last_message.body.to_lowercase().contains(q)
                })
            })
            .collect();
        rows.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));
        rows
    }

    /// The other participant of a conversation `member_id` takes part in.
    pub fn counterpart(&self, member_id: &str, conversation_id: &str) -> Result<&AuthorRef> {
        self.conversations
            .get(conversation_id)
            .filter(|c| c.includes(member_id))
            .map(|c| c.other(member_id))
            .ok_or_else(|| AppError::not_found("Conversation", conversation_id))
    }

    pub fn unread_total(&self, member_id: &str) -> usize {
        self.conversations
            .values()
            .filter(|c| c.includes(member_id))
            .map(|c| c.unread_for(member_id))
            .sum()
    }

    pub fn feed(&self, member_id: &str, query: Option<&str>) -> MessageFeed {
        MessageFeed {
            unread_count: self.unread_total(member_id),
            conversations: self.conversations(member_id, query),
        }
    }

    /// Opens a conversation: marks what the other side sent as read and
    /// returns the full thread, oldest first.
    pub fn open(&mut self, member_id: &str, conversation_id: &str) -> Result<ConversationThread> {
        let conversation = self.participating_mut(member_id, conversation_id)?;
        for message in conversation
            .messages
            .iter_mut()
            .filter(|m| m.sender.id != member_id)
        {
            message.read = true;
        }
        Ok(ConversationThread {
            id: conversation.id.clone(),
            participant: conversation.other(member_id).clone(),
            messages: conversation.messages.clone(),
        })
    }

    // Outsiders get the same answer as for a conversation that does not exist.
    fn participating_mut(&mut self, member_id: &str, conversation_id: &str) -> Result<&mut Conversation> {
        self.conversations
            .get_mut(conversation_id)
            .filter(|c| c.includes(member_id))
            .ok_or_else(|| AppError::not_found("Conversation", conversation_id))
    }
}
