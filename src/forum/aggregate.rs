//! Topic aggregate: topic metadata, its reply tree and its vote ledger.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::moderation::ModerationEffect;
use super::tree::{ReplyTree, ThreadPolicy};
use super::vote::{VoteLedger, VoteOutcome, VoteState, VoteType};
use crate::errors::{AppError, Result};
use crate::models::{
    seo_slug, ModerationAction, Reply, ReplyView, Topic, TopicSummary, TopicView,
};

/// Per-viewer inputs for rendering a topic.
#[derive(Debug, Clone, Copy)]
pub struct ViewContext<'a> {
    pub viewer: Option<&'a str>,
    pub policy: ThreadPolicy,
    /// Moderators see hidden bodies.
    pub include_hidden: bool,
    pub is_read: bool,
    pub bookmarked: bool,
}

#[derive(Debug, Clone)]
pub struct TopicAggregate {
    topic: Topic,
    replies: ReplyTree,
    votes: VoteLedger,
}

impl TopicAggregate {
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            replies: ReplyTree::new(),
            votes: VoteLedger::new(),
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn replies(&self) -> &ReplyTree {
        &self.replies
    }

    pub fn votes(&self) -> &VoteLedger {
        &self.votes
    }

    pub fn votes_mut(&mut self) -> &mut VoteLedger {
        &mut self.votes
    }

    pub fn id(&self) -> &str {
        &self.topic.id
    }

    /// True for the topic itself or any of its replies.
    pub fn contains(&self, content_id: &str) -> bool {
        content_id == self.topic.id || self.replies.contains(content_id)
    }

    /// Replies that have not been deleted.
    pub fn reply_count(&self) -> usize {
        self.replies.walk().iter().filter(|(r, _)| !r.deleted).count()
    }

    /// Changes title, body or tags. The reply tree and tallies are untouched.
    pub fn edit(
        &mut self,
        title: Option<String>,
        body: Option<String>,
        tags: Option<BTreeSet<String>>,
        at: DateTime<Utc>,
    ) -> &Topic {
        if let Some(title) = title {
            self.topic.slug = seo_slug(&title, &self.topic.id);
            self.topic.title = title;
        }
        if let Some(body) = body {
            self.topic.body = body;
        }
        if let Some(tags) = tags {
            self.topic.tags = tags;
        }
        self.topic.updated_at = Some(at);
        &self.topic
    }

    pub fn add_reply(&mut self, parent_id: Option<&str>, mut reply: Reply) -> Result<usize> {
        reply.topic_id = self.topic.id.clone();
        let at = reply.created_at;
        let depth = self.replies.insert_reply(parent_id, reply)?;
        self.topic.last_activity_at = at;
        Ok(depth)
    }

    pub fn edit_reply(&mut self, reply_id: &str, body: String, at: DateTime<Utc>) -> Result<&Reply> {
        self.replies.edit_body(reply_id, body, at)
    }

    pub fn delete_reply(&mut self, reply_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.replies.mark_deleted(reply_id, at)
    }

    fn ensure_content(&self, content_id: &str) -> Result<()> {
        if self.contains(content_id) {
            Ok(())
        } else {
            Err(AppError::not_found("Content", content_id))
        }
    }

    /// Toggles a vote on the topic or one of its replies.
    pub fn vote(
        &mut self,
        user_id: &str,
        content_id: &str,
        input: VoteType,
        request_id: Option<Uuid>,
    ) -> Result<VoteOutcome> {
        self.ensure_content(content_id)?;
        Ok(match request_id {
            Some(request_id) => self.votes.cast_once(user_id, content_id, input, request_id),
            None => self.votes.cast(user_id, content_id, input),
        })
    }

    /// Moves a vote to `target` on the topic or one of its replies.
    pub fn set_vote(
        &mut self,
        user_id: &str,
        content_id: &str,
        target: VoteState,
        request_id: Option<Uuid>,
    ) -> Result<VoteOutcome> {
        self.ensure_content(content_id)?;
        Ok(match request_id {
            Some(request_id) => self.votes.set_once(user_id, content_id, target, request_id),
            None => self.votes.set(user_id, content_id, target),
        })
    }

    pub fn record_view(&mut self) {
        self.topic.views += 1;
    }

    /// Applies a moderator action to the topic or one of its replies.
    pub fn apply_moderation(
        &mut self,
        content_id: &str,
        action: &ModerationAction,
        at: DateTime<Utc>,
    ) -> Result<ModerationEffect> {
        if content_id != self.topic.id {
            self.ensure_content(content_id)?;
            if action.is_topic_only() {
                return Err(AppError::Validation(format!(
                    "Cannot {} a reply",
                    action.name()
                )));
            }
            match action {
                ModerationAction::Hide => self.replies.set_hidden(content_id, true)?,
                ModerationAction::Show => self.replies.set_hidden(content_id, false)?,
                ModerationAction::Delete { .. } => self.replies.mark_deleted(content_id, at)?,
                _ => {}
            }
            return Ok(ModerationEffect::Applied);
        }

        match action {
            ModerationAction::Lock => self.topic.flags.locked = true,
            ModerationAction::Unlock => self.topic.flags.locked = false,
            ModerationAction::Pin => self.topic.flags.pinned = true,
            ModerationAction::Unpin => self.topic.flags.pinned = false,
            ModerationAction::Hide => self.topic.flags.hidden = true,
            ModerationAction::Show => self.topic.flags.hidden = false,
            ModerationAction::Move { category_id } => {
                let from = std::mem::replace(&mut self.topic.category_id, category_id.clone());
                return Ok(ModerationEffect::Moved { from });
            }
            ModerationAction::Delete { .. } => return Ok(ModerationEffect::TopicRemoved),
        }
        Ok(ModerationEffect::Applied)
    }

    pub fn summary(&self, ctx: &ViewContext<'_>) -> TopicSummary {
        let topic = &self.topic;
        TopicSummary {
            id: topic.id.clone(),
            slug: topic.slug.clone(),
            category_id: topic.category_id.clone(),
            title: topic.title.clone(),
            author: topic.author.clone(),
            created_at: topic.created_at,
            last_activity_at: topic.last_activity_at,
            tags: topic.tags.clone(),
            flags: topic.flags,
            views: topic.views,
            score: self.votes.score(&topic.id),
            reply_count: self.reply_count(),
            is_read: ctx.is_read,
            bookmarked: ctx.bookmarked,
        }
    }

    /// Renders the thread for one viewer.
    pub fn view(&self, ctx: &ViewContext<'_>) -> TopicView {
        let replies = self
            .replies
            .roots()
            .iter()
            .filter_map(|id| self.reply_view(id, 1, ctx))
            .collect();

        TopicView {
            topic: self.topic.clone(),
            score: self.votes.score(&self.topic.id),
            user_vote: self.vote_for(ctx, &self.topic.id),
            bookmarked: ctx.bookmarked,
            is_read: ctx.is_read,
            reply_count: self.reply_count(),
            root_reply_ids: self.replies.roots().to_vec(),
            replies,
        }
    }

    fn vote_for(&self, ctx: &ViewContext<'_>, content_id: &str) -> VoteState {
        ctx.viewer
            .map(|viewer| self.votes.vote_of(viewer, content_id))
            .unwrap_or_default()
    }

    fn reply_view(&self, id: &str, depth: usize, ctx: &ViewContext<'_>) -> Option<ReplyView> {
        let mut reply = self.replies.get(id)?.clone();
        let replies = reply
            .children
            .iter()
            .filter_map(|child| self.reply_view(child, depth + 1, ctx))
            .collect();

        if reply.hidden && !ctx.include_hidden {
            reply.body.clear();
            reply.attachments.clear();
            reply.quoted_reply = None;
        }
        let can_reply =
            !self.topic.flags.locked && !reply.deleted && ctx.policy.can_reply_under(depth);

        Some(ReplyView {
            depth,
            score: self.votes.score(id),
            user_vote: self.vote_for(ctx, id),
            can_reply,
            replies,
            reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorRef;

    fn author(id: &str) -> AuthorRef {
        AuthorRef {
            id: id.to_string(),
            username: format!("user-{}", id),
            display_name: format!("User {}", id),
        }
    }

    fn aggregate() -> TopicAggregate {
        TopicAggregate::new(Topic::new(
            "t1".to_string(),
            "general-discussion".to_string(),
            "Garden plans".to_string(),
            "Where should the beds go?".to_string(),
            author("1"),
            BTreeSet::new(),
            Utc::now(),
        ))
    }

    fn reply(id: &str) -> Reply {
        Reply::new(id.to_string(), String::new(), author("2"), format!("reply {}", id), Utc::now())
    }

    fn ctx(viewer: Option<&str>) -> ViewContext<'_> {
        ViewContext {
            viewer,
            policy: ThreadPolicy::default(),
            include_hidden: false,
            is_read: false,
            bookmarked: false,
        }
    }

    #[test]
    fn test_edit_leaves_tree_and_score() {
        let mut agg = aggregate();
        agg.add_reply(None, reply("r1")).unwrap();
        agg.vote("u1", "t1", VoteType::Up, None).unwrap();

        agg.edit(Some("Garden plans 2025".to_string()), None, None, Utc::now());

        assert_eq!(agg.topic().slug, "garden-plans-2025-t1");
        assert!(agg.topic().updated_at.is_some());
        assert_eq!(agg.votes().score("t1"), 1);
        assert_eq!(agg.replies().roots(), &["r1"]);
    }

    #[test]
    fn test_add_reply_sets_topic_id() {
        let mut agg = aggregate();
        agg.add_reply(None, reply("r1")).unwrap();
        assert_eq!(agg.replies().get("r1").unwrap().topic_id, "t1");
        assert_eq!(agg.reply_count(), 1);
    }

    #[test]
    fn test_vote_unknown_content() {
        let mut agg = aggregate();
        assert!(matches!(
            agg.vote("u1", "elsewhere", VoteType::Up, None),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_view_nests_and_limits_depth() {
        let mut agg = aggregate();
        let mut parent: Option<String> = None;
        for i in 0..6 {
            let id = format!("r{}", i);
            agg.add_reply(parent.as_deref(), reply(&id)).unwrap();
            parent = Some(id);
        }
        agg.vote("u1", "r0", VoteType::Down, None).unwrap();

        let view = agg.view(&ctx(Some("u1")));
        assert_eq!(view.reply_count, 6);
        let mut node = &view.replies[0];
        assert_eq!((node.score, node.user_vote), (-1, VoteState::Down));
        let mut depths = vec![(node.depth, node.can_reply)];
        while let Some(child) = node.replies.first() {
            node = child;
            depths.push((node.depth, node.can_reply));
        }
        assert_eq!(
            depths,
            vec![(1, true), (2, true), (3, true), (4, true), (5, true), (6, false)]
        );
    }

    #[test]
    fn test_hidden_reply_masked_for_members() {
        let mut agg = aggregate();
        agg.add_reply(None, reply("r1")).unwrap();
        agg.add_reply(Some("r1"), reply("r2")).unwrap();
        agg.apply_moderation("r1", &ModerationAction::Hide, Utc::now())
            .unwrap();

        let member = agg.view(&ctx(Some("u1")));
        assert!(member.replies[0].reply.hidden);
        assert!(member.replies[0].reply.body.is_empty());
        assert_eq!(member.replies[0].replies.len(), 1);

        let moderator = agg.view(&ViewContext {
            include_hidden: true,
            ..ctx(Some("u3"))
        });
        assert_eq!(moderator.replies[0].reply.body, "reply r1");
    }

    #[test]
    fn test_topic_moderation() {
        let mut agg = aggregate();
        agg.add_reply(None, reply("r1")).unwrap();

        agg.apply_moderation("t1", &ModerationAction::Lock, Utc::now())
            .unwrap();
        assert!(agg.topic().flags.locked);
        assert!(!agg.view(&ctx(None)).replies[0].can_reply);

        let effect = agg
            .apply_moderation(
                "t1",
                &ModerationAction::Move {
                    category_id: "local-news".to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(
            effect,
            ModerationEffect::Moved {
                from: "general-discussion".to_string()
            }
        );
        assert_eq!(agg.topic().category_id, "local-news");

        let effect = agg
            .apply_moderation("t1", &ModerationAction::Delete { reason: None }, Utc::now())
            .unwrap();
        assert_eq!(effect, ModerationEffect::TopicRemoved);
    }

    #[test]
    fn test_topic_only_action_on_reply() {
        let mut agg = aggregate();
        agg.add_reply(None, reply("r1")).unwrap();
        assert!(matches!(
            agg.apply_moderation("r1", &ModerationAction::Pin, Utc::now()),
            Err(AppError::Validation(_))
        ));
    }
}
