//! Per-member notification feeds for replies and `@username` mentions.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{AuthorRef, Notification, NotificationFeed, NotificationKind, Reply, Topic};

/// Usernames mentioned as `@name`, in order of first appearance.
///
/// A mention starts at `@` that does not follow a word character, so email
/// addresses are skipped.
pub fn mentions(body: &str) -> Vec<String> {
    let is_name_char = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut prev: Option<char> = None;
    let mut chars = body.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let starts_mention = c == '@' && !prev.is_some_and(|p| p.is_alphanumeric() || p == '_');
        prev = Some(c);
        if !starts_mention {
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while let Some(&(j, n)) = chars.peek() {
            if !is_name_char(n) {
                break;
            }
            end = j + n.len_utf8();
            prev = Some(n);
            chars.next();
        }
        let name = body[start..end].trim_end_matches('-');
        if !name.is_empty() && seen.insert(name.to_lowercase()) {
            out.push(name.to_string());
        }
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct NotificationCenter {
    feeds: HashMap<String, Vec<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, recipient: &str, notification: Notification) {
        self.feeds
            .entry(recipient.to_string())
            .or_default()
            .push(notification);
    }

    /// Notifies the author being replied to and every mentioned member.
    ///
    /// `replied_to` is the parent reply's author, or the topic author for a
    /// root reply. The actor is never notified, and nobody is notified twice
    /// for one reply. Returns the number of notifications delivered.
    pub fn deliver_reply(
        &mut self,
        topic: &Topic,
        replied_to: &AuthorRef,
        reply: &Reply,
        mentioned: &[AuthorRef],
    ) -> usize {
        let actor = &reply.author;
        let mut notified: HashSet<&str> = HashSet::new();
        notified.insert(actor.id.as_str());

        let now = Utc::now();
        let base = |kind, title: &str, message: String| Notification {
            id: Uuid::new_v4().to_string(),
            kind,
            title: title.to_string(),
            message,
            read: false,
            created_at: now,
            topic_id: topic.id.clone(),
            reply_id: Some(reply.id.clone()),
            actor: actor.clone(),
        };

        let mut delivered = 0;
        if notified.insert(replied_to.id.as_str()) {
            let title = if reply.parent_id.is_some() {
                "New reply to your post"
            } else {
                "New reply to your topic"
            };
            let message = format!("{} replied to '{}'", actor.display_name, topic.title);
            self.push(&replied_to.id, base(NotificationKind::Reply, title, message));
            delivered += 1;
        }
        for member in mentioned {
            if notified.insert(member.id.as_str()) {
                let message = format!("{} mentioned you in '{}'", actor.display_name, topic.title);
                self.push(&member.id, base(NotificationKind::Mention, "You were mentioned", message));
                delivered += 1;
            }
        }
        delivered
    }

    /// Newest first.
    pub fn list(&self, user_id: &str) -> Vec<Notification> {
        self.feeds
            .get(user_id)
            .map(|feed| feed.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    pub fn unread_count(&self, user_id: &str) -> usize {
        self.feeds
            .get(user_id)
            .map_or(0, |feed| feed.iter().filter(|n| !n.read).count())
    }

    pub fn feed(&self, user_id: &str) -> NotificationFeed {
        NotificationFeed {
            unread_count: self.unread_count(user_id),
            items: self.list(user_id),
        }
    }

    pub fn mark_read(&mut self, user_id: &str, notification_id: &str) -> Result<Notification> {
        let notification = self
            .feeds
            .get_mut(user_id)
            .and_then(|feed| feed.iter_mut().find(|n| n.id == notification_id))
            .ok_or_else(|| AppError::not_found("Notification", notification_id))?;
        notification.read = true;
        Ok(notification.clone())
    }

    /// Returns how many were unread.
    pub fn mark_all_read(&mut self, user_id: &str) -> usize {
        let Some(feed) = self.feeds.get_mut(user_id) else {
            return 0;
        };
        let mut changed = 0;
        for notification in feed.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        changed
    }

    pub fn forget_topic(&mut self, topic_id: &str) {
        for feed in self.feeds.values_mut() {
            feed.retain(|n| n.topic_id != topic_id);
        }
    }
}
