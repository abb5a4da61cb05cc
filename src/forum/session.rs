//! Client-side discussion session with optimistic updates.
//!
//! Votes and replies are applied to a local copy of the thread first and then
//! submitted through a [`ForumGateway`]. A failed submission restores the
//! local state exactly. Votes on the same content go through a per-content
//! lane so a rapid second click observes the state left by the first.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::gateway::ForumGateway;
use super::quote::DEFAULT_EXCERPT_CHARS;
use super::tree::{ReplyTree, ThreadPolicy};
use super::vote::{VoteLedger, VoteOutcome, VoteState, VoteType};
use crate::errors::{AppError, Result};
use crate::models::{AuthorRef, CreateReplyRequest, QuoteSnapshot, Reply, ReplyView, TopicView};

const PENDING_PREFIX: &str = "pending-";

#[derive(Debug, Clone, Copy)]
struct PendingVote {
    previous: VoteState,
    target: VoteState,
}

#[derive(Debug, Default)]
struct LocalThread {
    tree: ReplyTree,
    votes: VoteLedger,
    pending_votes: HashMap<String, PendingVote>,
    pending_replies: HashSet<String>,
}

pub struct DiscussionSession<G> {
    gateway: Arc<G>,
    author: AuthorRef,
    topic_id: String,
    policy: ThreadPolicy,
    quote_chars: usize,
    local: Mutex<LocalThread>,
    lanes: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl<G: ForumGateway> DiscussionSession<G> {
    /// Starts a session for `author` from a rendered thread snapshot.
    pub fn new(gateway: Arc<G>, author: AuthorRef, view: &TopicView) -> Self {
        let mut local = LocalThread::default();
        local.votes.seed(&view.topic.id, view.score);
        local.votes.seed_vote(&author.id, &view.topic.id, view.user_vote);
        for root in &view.replies {
            seed_reply(&mut local, &author.id, None, root);
        }

        Self {
            gateway,
            author,
            topic_id: view.topic.id.clone(),
            policy: ThreadPolicy::default(),
            quote_chars: DEFAULT_EXCERPT_CHARS,
            local: Mutex::new(local),
            lanes: DashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: ThreadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_quote_chars(mut self, quote_chars: usize) -> Self {
        self.quote_chars = quote_chars;
        self
    }

    fn local(&self) -> MutexGuard<'_, LocalThread> {
        self.local.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lane(&self, content_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.lanes
            .entry(content_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn knows(&self, local: &LocalThread, content_id: &str) -> bool {
        content_id == self.topic_id || local.tree.contains(content_id)
    }

    /// Clicks a vote button on the topic or one of its replies.
    pub async fn vote(&self, content_id: &str, input: VoteType) -> Result<VoteOutcome> {
        let lane = self.lane(content_id);
        let _turn = lane.lock().await;

        let pending = {
            let mut local = self.local();
            if !self.knows(&local, content_id) {
                return Err(AppError::not_found("Content", content_id));
            }
            if local.pending_replies.contains(content_id) {
                return Err(AppError::Conflict(format!(
                    "Reply {} is still being posted",
                    content_id
                )));
            }
            let previous = local.votes.vote_of(&self.author.id, content_id);
            let outcome = local.votes.cast(&self.author.id, content_id, input);
            let pending = PendingVote {
                previous,
                target: outcome.user_vote,
            };
            local.pending_votes.insert(content_id.to_string(), pending);
            pending
        };

        let result = self
            .gateway
            .submit_vote(
                &self.author.id,
                &self.topic_id,
                content_id,
                pending.target,
                Uuid::new_v4(),
            )
            .await;

        let mut local = self.local();
        local.pending_votes.remove(content_id);
        match result {
            Ok(outcome) => {
                local.votes.seed(content_id, outcome.score);
                local
                    .votes
                    .seed_vote(&self.author.id, content_id, outcome.user_vote);
                Ok(outcome)
            }
            Err(err) => {
                local.votes.set(&self.author.id, content_id, pending.previous);
                tracing::warn!(content_id, error = %err, "vote rolled back");
                Err(err)
            }
        }
    }

    /// Posts a reply under `parent_id`, or at the root when `None`.
    pub async fn reply(
        &self,
        parent_id: Option<&str>,
        body: &str,
        quote_of: Option<&str>,
    ) -> Result<Reply> {
        let request = CreateReplyRequest {
            body: body.to_string(),
            parent_id: parent_id.map(str::to_string),
            quote_of: quote_of.map(str::to_string),
            ..Default::default()
        };
        request.validate()?;

        let pending_id = format!("{}{}", PENDING_PREFIX, Uuid::new_v4());
        {
            let mut local = self.local();
            if let Some(parent) = parent_id {
                if local.pending_replies.contains(parent) {
                    return Err(AppError::Conflict(format!(
                        "Reply {} is still being posted",
                        parent
                    )));
                }
                let depth = local
                    .tree
                    .depth(parent)
                    .ok_or_else(|| AppError::not_found("Parent reply", parent))?;
                if !self.policy.can_reply_under(depth) {
                    return Err(AppError::Validation(format!(
                        "Replies cannot be nested deeper than {} levels",
                        self.policy.max_reply_depth
                    )));
                }
            }

            let mut node = Reply::new(
                pending_id.clone(),
                self.topic_id.clone(),
                self.author.clone(),
                request.body.clone(),
                Utc::now(),
            );
            if let Some(quoted) = quote_of {
                let source = local
                    .tree
                    .get(quoted)
                    .ok_or_else(|| AppError::not_found("Reply", quoted))?;
                node.quoted_reply = Some(QuoteSnapshot::capture(source, self.quote_chars)?);
            }
            local.tree.insert_reply(parent_id, node)?;
            local.pending_replies.insert(pending_id.clone());
        }

        let result = self
            .gateway
            .submit_reply(&self.author.id, &self.topic_id, request)
            .await;

        let mut local = self.local();
        local.pending_replies.remove(&pending_id);
        match result {
            Ok(reply) => {
                if let Err(err) = local.tree.rekey(&pending_id, reply.clone()) {
                    if let Err(retract_err) = local.tree.retract(&pending_id) {
                        tracing::debug!(error = %retract_err, "pending reply already gone");
                    }
                    tracing::warn!(reply_id = %reply.id, error = %err, "confirmed reply could not replace pending node");
                    return Err(err);
                }
                local.votes.seed(&reply.id, 0);
                Ok(reply)
            }
            Err(err) => {
                local.tree.retract(&pending_id)?;
                tracing::warn!(topic_id = %self.topic_id, error = %err, "reply rolled back");
                Err(err)
            }
        }
    }

    /// Snapshot of a reply as it currently reads locally.
    pub fn quote(&self, reply_id: &str) -> Result<QuoteSnapshot> {
        let local = self.local();
        let reply = local
            .tree
            .get(reply_id)
            .ok_or_else(|| AppError::not_found("Reply", reply_id))?;
        QuoteSnapshot::capture(reply, self.quote_chars)
    }

    pub fn score(&self, content_id: &str) -> i64 {
        self.local().votes.score(content_id)
    }

    pub fn user_vote(&self, content_id: &str) -> VoteState {
        self.local().votes.vote_of(&self.author.id, content_id)
    }

    /// True while a vote on, or the posting of, `content_id` is in flight.
    pub fn is_pending(&self, content_id: &str) -> bool {
        let local = self.local();
        local.pending_votes.contains_key(content_id) || local.pending_replies.contains(content_id)
    }

    /// Replies in the local thread, not counting deleted ones.
    pub fn reply_count(&self) -> usize {
        self.local()
            .tree
            .walk()
            .iter()
            .filter(|(r, _)| !r.deleted)
            .count()
    }

    /// Children of `parent_id`, or the root replies for `None`.
    pub fn children(&self, parent_id: Option<&str>) -> Vec<String> {
        let local = self.local();
        match parent_id {
            None => local.tree.roots().to_vec(),
            Some(parent) => local
                .tree
                .children(parent)
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
        }
    }
}

fn seed_reply(local: &mut LocalThread, user_id: &str, parent_id: Option<&str>, view: &ReplyView) {
    let id = view.reply.id.as_str();
    if local.tree.insert_reply(parent_id, view.reply.clone()).is_err() {
        return;
    }
    local.votes.seed(id, view.score);
    local.votes.seed_vote(user_id, id, view.user_vote);
    for child in &view.replies {
        seed_reply(local, user_id, Some(id), child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::models::Topic;

    fn sarah() -> AuthorRef {
        AuthorRef {
            id: "1".to_string(),
            username: "sarah-johnson".to_string(),
            display_name: "Sarah Johnson".to_string(),
        }
    }

    fn snapshot() -> TopicView {
        let topic = Topic::new(
            "t1".to_string(),
            "general-discussion".to_string(),
            "Garden".to_string(),
            "Plans".to_string(),
            sarah(),
            BTreeSet::new(),
            Utc::now(),
        );
        let reply = Reply::new(
            "r1".to_string(),
            "t1".to_string(),
            sarah(),
            "First!".to_string(),
            Utc::now(),
        );
        TopicView {
            topic,
            score: 5,
            user_vote: VoteState::None,
            bookmarked: false,
            is_read: true,
            reply_count: 1,
            root_reply_ids: vec!["r1".to_string()],
            replies: vec![ReplyView {
                reply,
                depth: 1,
                score: 2,
                user_vote: VoteState::Up,
                can_reply: true,
                replies: vec![],
            }],
        }
    }

    struct FailingGateway;

    #[async_trait]
    impl ForumGateway for FailingGateway {
        async fn submit_reply(&self, _: &str, _: &str, _: CreateReplyRequest) -> Result<Reply> {
            Err(AppError::Internal("gateway offline".to_string()))
        }

        async fn submit_vote(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: VoteState,
            _: Uuid,
        ) -> Result<VoteOutcome> {
            Err(AppError::Internal("gateway offline".to_string()))
        }
    }

    /// Echoes submissions into its own ledger after a delay.
    #[derive(Default)]
    struct SlowGateway {
        ledger: tokio::sync::Mutex<VoteLedger>,
        targets: Mutex<Vec<VoteState>>,
    }

    #[async_trait]
    impl ForumGateway for SlowGateway {
        async fn submit_reply(
            &self,
            _: &str,
            topic_id: &str,
            request: CreateReplyRequest,
        ) -> Result<Reply> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let mut reply = Reply::new(
                Uuid::new_v4().to_string(),
                topic_id.to_string(),
                sarah(),
                request.body,
                Utc::now(),
            );
            reply.parent_id = request.parent_id;
            Ok(reply)
        }

        async fn submit_vote(
            &self,
            user_id: &str,
            _: &str,
            content_id: &str,
            target: VoteState,
            request_id: Uuid,
        ) -> Result<VoteOutcome> {
            self.targets.lock().unwrap().push(target);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(self
                .ledger
                .lock()
                .await
                .set_once(user_id, content_id, target, request_id))
        }
    }

    #[tokio::test]
    async fn test_failed_vote_rolls_back() {
        let session = DiscussionSession::new(Arc::new(FailingGateway), sarah(), &snapshot());

        let err = session.vote("t1", VoteType::Down).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(session.score("t1"), 5);
        assert_eq!(session.user_vote("t1"), VoteState::None);
        assert!(!session.is_pending("t1"));

        session.vote("r1", VoteType::Down).await.unwrap_err();
        assert_eq!(session.score("r1"), 2);
        assert_eq!(session.user_vote("r1"), VoteState::Up);
    }

    #[tokio::test]
    async fn test_failed_reply_is_retracted() {
        let session = DiscussionSession::new(Arc::new(FailingGateway), sarah(), &snapshot());

        session.reply(Some("r1"), "Agreed", None).await.unwrap_err();

        assert_eq!(session.reply_count(), 1);
        assert!(session.children(Some("r1")).is_empty());
        assert_eq!(session.children(None), vec!["r1"]);
    }

    #[tokio::test]
    async fn test_reply_validation_is_local() {
        let session = DiscussionSession::new(Arc::new(FailingGateway), sarah(), &snapshot());
        assert!(matches!(
            session.reply(None, "   ", None).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            session.reply(Some("nope"), "hello", None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_double_click_serializes() {
        let gateway = Arc::new(SlowGateway::default());
        gateway.ledger.lock().await.seed("t1", 5);
        let session = DiscussionSession::new(gateway.clone(), sarah(), &snapshot());

        let (first, second) = tokio::join!(
            session.vote("t1", VoteType::Up),
            session.vote("t1", VoteType::Up)
        );

        assert_eq!(first.unwrap().user_vote, VoteState::Up);
        assert_eq!(second.unwrap().user_vote, VoteState::None);
        assert_eq!(session.score("t1"), 5);
        assert_eq!(session.user_vote("t1"), VoteState::None);
        assert_eq!(*gateway.targets.lock().unwrap(), vec![VoteState::Up, VoteState::None]);
    }

    #[tokio::test]
    async fn test_confirmed_reply_replaces_pending_node() {
        let session = DiscussionSession::new(Arc::new(SlowGateway::default()), sarah(), &snapshot());

        let reply = session
            .reply(Some("r1"), "Count me in", Some("r1"))
            .await
            .unwrap();

        assert_eq!(session.children(Some("r1")), vec![reply.id.clone()]);
        assert!(!session.is_pending(&reply.id));
        assert_eq!(session.reply_count(), 2);
        assert_eq!(session.quote("r1").unwrap().excerpt, "First!");
    }

    /// Confirms every reply with an id the thread already holds.
    struct DuplicateIdGateway;

    #[async_trait]
    impl ForumGateway for DuplicateIdGateway {
        async fn submit_reply(
            &self,
            _: &str,
            topic_id: &str,
            request: CreateReplyRequest,
        ) -> Result<Reply> {
            Ok(Reply::new(
                "r1".to_string(),
                topic_id.to_string(),
                sarah(),
                request.body,
                Utc::now(),
            ))
        }

        async fn submit_vote(
            &self,
            _: &str,
            _: &str,
            content_id: &str,
            target: VoteState,
            _: Uuid,
        ) -> Result<VoteOutcome> {
            Ok(VoteOutcome {
                content_id: content_id.to_string(),
                score: 0,
                user_vote: target,
            })
        }
    }

    #[tokio::test]
    async fn test_unplaceable_confirmation_drops_pending_node() {
        let session = DiscussionSession::new(Arc::new(DuplicateIdGateway), sarah(), &snapshot());

        let err = session.reply(None, "Second root", None).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(session.children(None), vec!["r1"]);
        assert_eq!(session.reply_count(), 1);
    }

    #[tokio::test]
    async fn test_reply_count_skips_tombstones() {
        let mut view = snapshot();
        let mut removed = Reply::new(
            "r2".to_string(),
            "t1".to_string(),
            sarah(),
            String::new(),
            Utc::now(),
        );
        removed.deleted = true;
        view.replies[0].replies.push(ReplyView {
            reply: removed,
            depth: 2,
            score: 0,
            user_vote: VoteState::None,
            can_reply: false,
            replies: vec![],
        });

        let session = DiscussionSession::new(Arc::new(FailingGateway), sarah(), &view);

        assert_eq!(session.children(Some("r1")), vec!["r2"]);
        assert_eq!(session.reply_count(), 1);
    }
}
