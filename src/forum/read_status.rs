//! Per-member read flags and bookmarks.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct ReadTracker {
    read: HashMap<String, HashSet<String>>,
}

impl ReadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_read(&self, user_id: &str, topic_id: &str) -> bool {
        self.read
            .get(user_id)
            .is_some_and(|topics| topics.contains(topic_id))
    }

    pub fn mark_read(&mut self, user_id: &str, topic_id: &str) {
        self.read
            .entry(user_id.to_string())
            .or_default()
            .insert(topic_id.to_string());
    }

    pub fn mark_unread(&mut self, user_id: &str, topic_id: &str) {
        if let Some(topics) = self.read.get_mut(user_id) {
            topics.remove(topic_id);
        }
    }

    /// Sets the flag explicitly and returns it.
    pub fn toggle(&mut self, user_id: &str, topic_id: &str, is_read: bool) -> bool {
        if is_read {
            self.mark_read(user_id, topic_id);
        } else {
            self.mark_unread(user_id, topic_id);
        }
        is_read
    }

    /// New activity makes a topic unread for everyone but the actor.
    pub fn mark_unread_for_all_except(&mut self, topic_id: &str, actor_id: &str) {
        for (user_id, topics) in self.read.iter_mut() {
            if user_id != actor_id {
                topics.remove(topic_id);
            }
        }
    }

    pub fn forget_topic(&mut self, topic_id: &str) {
        for topics in self.read.values_mut() {
            topics.remove(topic_id);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bookmarks {
    saved: HashMap<String, HashSet<String>>,
}

impl Bookmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bookmarked(&self, user_id: &str, topic_id: &str) -> bool {
        self.saved
            .get(user_id)
            .is_some_and(|topics| topics.contains(topic_id))
    }

    /// Flips the bookmark and returns the new state.
    pub fn toggle(&mut self, user_id: &str, topic_id: &str) -> bool {
        let topics = self.saved.entry(user_id.to_string()).or_default();
        if topics.remove(topic_id) {
            false
        } else {
            topics.insert(topic_id.to_string());
            true
        }
    }

    pub fn list(&self, user_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .saved
            .get(user_id)
            .map(|topics| topics.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn forget_topic(&mut self, topic_id: &str) {
        for topics in self.saved.values_mut() {
            topics.remove(topic_id);
        }
    }
}
