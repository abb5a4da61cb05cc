//! In-memory forum state.
//!
//! Every aggregate and piece of side-state lives behind one async
//! `RwLock`. Mutations take the write lock and run to completion, so votes on
//! the same (member, content) pair are applied one after another. The
//! revision counter moves on every accepted write.

mod repository;
pub mod seed;

pub use repository::*;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::errors::{AppError, Result};
use crate::forum::{
    Bookmarks, MessageCenter, NotificationCenter, ReadTracker, ReportQueue, TopicAggregate,
};
use crate::models::{AuthorRef, Category, User};

#[derive(Debug)]
pub(crate) struct ForumState {
    revision_id: i64,
    generated_at: DateTime<Utc>,
    users: BTreeMap<String, User>,
    categories: Vec<Category>,
    topics: HashMap<String, TopicAggregate>,
    /// Reply id to owning topic id.
    reply_topics: HashMap<String, String>,
    reports: ReportQueue,
    read: ReadTracker,
    bookmarks: Bookmarks,
    notifications: NotificationCenter,
    messages: MessageCenter,
}

impl ForumState {
    fn new(users: Vec<User>, categories: Vec<Category>) -> Self {
        Self {
            revision_id: 0,
            generated_at: Utc::now(),
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
            categories,
            topics: HashMap::new(),
            reply_topics: HashMap::new(),
            reports: ReportQueue::new(),
            read: ReadTracker::new(),
            bookmarks: Bookmarks::new(),
            notifications: NotificationCenter::new(),
            messages: MessageCenter::new(),
        }
    }

    fn bump_revision(&mut self) -> i64 {
        self.revision_id += 1;
        self.generated_at = Utc::now();
        self.revision_id
    }

    fn author(&self, user_id: &str) -> Result<AuthorRef> {
        self.users
            .get(user_id)
            .map(User::author_ref)
            .ok_or_else(|| AppError::not_found("User", user_id))
    }

    fn user_mut(&mut self, user_id: &str) -> Result<&mut User> {
        self.users
            .get_mut(user_id)
            .ok_or_else(|| AppError::not_found("User", user_id))
    }

    fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    fn category(&self, id: &str) -> Result<&Category> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::not_found("Category", id))
    }

    fn insert_aggregate(&mut self, aggregate: TopicAggregate) {
        let topic_id = aggregate.id().to_string();
        for (reply, _) in aggregate.replies().walk() {
            self.reply_topics.insert(reply.id.clone(), topic_id.clone());
        }
        self.topics.insert(topic_id, aggregate);
    }

    /// Drops a topic and everything hanging off it.
    fn remove_aggregate(&mut self, topic_id: &str) -> Option<TopicAggregate> {
        let aggregate = self.topics.remove(topic_id)?;
        self.reply_topics.retain(|_, t| t != topic_id);
        self.reports.forget_topic(topic_id);
        self.read.forget_topic(topic_id);
        self.bookmarks.forget_topic(topic_id);
        self.notifications.forget_topic(topic_id);
        Some(aggregate)
    }

    /// Topic id owning `content_id`, which is a topic id or a reply id.
    fn topic_of(&self, content_id: &str) -> Result<String> {
        if self.topics.contains_key(content_id) {
            return Ok(content_id.to_string());
        }
        self.reply_topics
            .get(content_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Content", content_id))
    }

    fn aggregate(&self, topic_id: &str) -> Result<&TopicAggregate> {
        self.topics
            .get(topic_id)
            .ok_or_else(|| AppError::not_found("Topic", topic_id))
    }

    fn aggregate_mut(&mut self, topic_id: &str) -> Result<&mut TopicAggregate> {
        self.topics
            .get_mut(topic_id)
            .ok_or_else(|| AppError::not_found("Topic", topic_id))
    }
}
