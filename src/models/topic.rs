//! Topic model and its request/response shapes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthorRef, ReplyView};
use crate::errors::{AppError, Result};
use crate::forum::VoteState;

/// Maximum length for topic titles in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Maximum size of a topic or reply body in bytes (100 KB).
pub const MAX_BODY_BYTES: usize = 100 * 1024;

/// Maximum number of tags on one topic.
pub const MAX_TAGS: usize = 10;

/// Slug prefix length before the id suffix.
const SLUG_PREFIX_CHARS: usize = 60;

/// Moderator-controlled topic state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TopicFlags {
    pub pinned: bool,
    pub locked: bool,
    pub hidden: bool,
}

/// A discussion topic. Root reply order lives in the aggregate's reply tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub slug: String,
    pub category_id: String,
    pub title: String,
    pub author: AuthorRef,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
    pub tags: BTreeSet<String>,
    pub flags: TopicFlags,
    pub views: u64,
}

impl Topic {
    pub fn new(
        id: String,
        category_id: String,
        title: String,
        body: String,
        author: AuthorRef,
        tags: BTreeSet<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            slug: seo_slug(&title, &id),
            id,
            category_id,
            title,
            author,
            body,
            created_at: at,
            updated_at: None,
            last_activity_at: at,
            tags,
            flags: TopicFlags::default(),
            views: 0,
        }
    }
}

/// Builds `{slug}-{id}`: lowercase ASCII alphanumerics, whitespace and
/// hyphen runs collapsed to a single `-`, prefix capped at 60 chars.
pub fn seo_slug(title: &str, id: &str) -> String {
    let mut slug = String::new();
    for ch in title.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
        } else if (ch.is_whitespace() || ch == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let prefix: String = slug.chars().take(SLUG_PREFIX_CHARS).collect();
    format!("{}-{}", prefix, id)
}

/// Extracts the topic id from either a bare id or a `{slug}-{uuid}` path segment.
pub fn topic_id_from_slug(segment: &str) -> &str {
    const UUID_LEN: usize = 36;
    if segment.len() > UUID_LEN {
        let split = segment.len() - UUID_LEN;
        if segment.is_char_boundary(split) && segment.as_bytes()[split - 1] == b'-' {
            let tail = &segment[split..];
            if uuid::Uuid::parse_str(tail).is_ok() {
                return tail;
            }
        }
    }
    segment
}

fn normalize_tags(tags: &[String]) -> Result<BTreeSet<String>> {
    let set: BTreeSet<String> = tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if set.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "A topic can carry at most {} tags",
            MAX_TAGS
        )));
    }
    Ok(set)
}

pub(crate) fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "Title exceeds maximum length of {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

pub(crate) fn validate_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(AppError::Validation("Body is required".to_string()));
    }
    if body.len() > MAX_BODY_BYTES {
        return Err(AppError::Validation(format!(
            "Body exceeds maximum size of {} bytes",
            MAX_BODY_BYTES
        )));
    }
    Ok(())
}

/// Request body for creating a new topic.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateTopicRequest {
    pub fn validate(&self) -> Result<BTreeSet<String>> {
        validate_title(&self.title)?;
        validate_body(&self.body)?;
        normalize_tags(&self.tags)
    }
}

/// Request body for editing a topic. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTopicRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl UpdateTopicRequest {
    pub fn validate(&self) -> Result<Option<BTreeSet<String>>> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(body) = &self.body {
            validate_body(body)?;
        }
        self.tags.as_deref().map(normalize_tags).transpose()
    }
}

/// Topic as seen in category listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub id: String,
    pub slug: String,
    pub category_id: String,
    pub title: String,
    pub author: AuthorRef,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub tags: BTreeSet<String>,
    pub flags: TopicFlags,
    pub views: u64,
    pub score: i64,
    pub reply_count: usize,
    pub is_read: bool,
    pub bookmarked: bool,
}

/// A topic with its nested replies, rendered for one viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicView {
    #[serde(flatten)]
    pub topic: Topic,
    pub score: i64,
    pub user_vote: VoteState,
    pub bookmarked: bool,
    pub is_read: bool,
    pub reply_count: usize,
    pub root_reply_ids: Vec<String>,
    pub replies: Vec<ReplyView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seo_slug_strips_and_collapses() {
        assert_eq!(
            seo_slug("New community garden -- proposal!", "42"),
            "new-community-garden-proposal-42"
        );
        assert_eq!(seo_slug("Café   au lait", "7"), "caf-au-lait-7");
    }

    #[test]
    fn test_seo_slug_caps_prefix() {
        let slug = seo_slug(&"a".repeat(100), "id");
        assert_eq!(slug, format!("{}-id", "a".repeat(60)));
    }

    #[test]
    fn test_topic_id_from_slug() {
        let id = "0b8a4a34-5c1e-4b8f-9c4e-7d2f1a3b5c6d";
        let slug = seo_slug("Oak Street Park", id);
        assert_eq!(topic_id_from_slug(&slug), id);
        assert_eq!(topic_id_from_slug(id), id);
        assert_eq!(topic_id_from_slug("plain-words"), "plain-words");
    }

    #[test]
    fn test_create_request_validation() {
        let mut request = CreateTopicRequest {
            title: "  ".to_string(),
            body: "body".to_string(),
            tags: vec![],
        };
        assert!(matches!(request.validate(), Err(AppError::Validation(_))));

        request.title = "Garden".to_string();
        request.tags = vec![" Parks ".to_string(), "Parks".to_string(), "".to_string()];
        let tags = request.validate().unwrap();
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("Parks"));
    }
}
