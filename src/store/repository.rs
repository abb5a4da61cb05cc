//! Repository for all forum operations.
//!
//! Each method receives the acting member explicitly and checks permissions
//! and input before touching state.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{seed, ForumState};
use crate::auth::permissions::{self, Permission};
use crate::config::Config;
use crate::errors::{AppError, Result};
use crate::forum::{
    mentions, rate_limit, ActionKind, ForumGateway, ModerationEffect, RateLimiter, ThreadPolicy,
    TopicAggregate, ViewContext, VoteOutcome, VoteState, DEFAULT_EXCERPT_CHARS,
};
use crate::models::{
    topic_id_from_slug, Ban, BanRequest, CategorySummary, ContentType, ConversationThread,
    CreateReplyRequest, CreateReportRequest, CreateTopicRequest, Message, MessageFeed,
    ModerationAction, ModerationResult, Notification, NotificationFeed, Page, PageQuery,
    QuoteSnapshot, Reply, ReplyMessageRequest, Report, ReportResolution, ReportStatus,
    RevisionInfo, SendMessageRequest, SubmitVoteRequest, Topic, TopicSummary, TopicView,
    UpdateReplyRequest, UpdateTopicRequest, User, UserQuery, UserRole, VoteCommand,
};
use crate::search::SearchDocument;

/// Tunables for the repository.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub policy: ThreadPolicy,
    pub quote_chars: usize,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            policy: ThreadPolicy::default(),
            quote_chars: DEFAULT_EXCERPT_CHARS,
            rate_limit_max: rate_limit::DEFAULT_LIMIT,
            rate_limit_window: rate_limit::DEFAULT_WINDOW,
        }
    }
}

impl From<&Config> for StoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            policy: config.thread_policy(),
            quote_chars: config.quote_excerpt_chars,
            rate_limit_max: config.rate_limit_max,
            rate_limit_window: config.rate_limit_window,
        }
    }
}

/// Repository over the in-memory forum state.
pub struct Repository {
    state: RwLock<ForumState>,
    limiter: RateLimiter,
    options: StoreOptions,
}

fn is_moderator(viewer: Option<&User>) -> bool {
    viewer.is_some_and(|u| permissions::has_permission(u, Permission::EditAnyContent))
}

fn view_context<'a>(
    state: &ForumState,
    policy: ThreadPolicy,
    viewer: Option<&'a User>,
    topic_id: &str,
) -> ViewContext<'a> {
    let viewer_id = viewer.map(|u| u.id.as_str());
    ViewContext {
        viewer: viewer_id,
        policy,
        include_hidden: is_moderator(viewer),
        is_read: viewer_id.is_some_and(|id| state.read.is_read(id, topic_id)),
        bookmarked: viewer_id.is_some_and(|id| state.bookmarks.is_bookmarked(id, topic_id)),
    }
}

fn resolve_topic_id(state: &ForumState, segment: &str) -> Result<String> {
    let id = topic_id_from_slug(segment);
    if state.topics.contains_key(id) {
        return Ok(id.to_string());
    }
    state
        .topics
        .values()
        .find(|a| a.topic().slug == segment)
        .map(|a| a.id().to_string())
        .ok_or_else(|| AppError::not_found("Topic", segment))
}

fn topic_of_reply(state: &ForumState, reply_id: &str) -> Result<String> {
    state
        .reply_topics
        .get(reply_id)
        .cloned()
        .ok_or_else(|| AppError::not_found("Reply", reply_id))
}

fn apply_vote(
    state: &mut ForumState,
    user: &User,
    topic_id: &str,
    content_id: &str,
    command: VoteCommand,
    request_id: Option<Uuid>,
) -> Result<VoteOutcome> {
    let moderator = is_moderator(Some(user));
    let aggregate = state.aggregate_mut(topic_id)?;
    if aggregate.topic().flags.hidden && !moderator {
        return Err(AppError::not_found("Content", content_id));
    }
    if aggregate.replies().get(content_id).is_some_and(|r| r.deleted) {
        return Err(AppError::Validation(
            "Cannot vote on a deleted reply".to_string(),
        ));
    }
    match command {
        VoteCommand::Toggle(input) => aggregate.vote(&user.id, content_id, input, request_id),
        VoteCommand::Set(target) => aggregate.set_vote(&user.id, content_id, target, request_id),
    }
}

/// Moderators act on plain members, administrators on everyone below them.
/// Nobody acts on their own account.
fn require_outranks(actor: &User, target: &User) -> Result<()> {
    if actor.id == target.id {
        return Err(AppError::Forbidden(
            "You cannot change your own account".to_string(),
        ));
    }
    if actor.role <= target.role {
        return Err(AppError::Forbidden(format!(
            "{} cannot manage {}",
            actor.username, target.username
        )));
    }
    Ok(())
}

fn lift_ban(user: &mut User) {
    user.banned = false;
    user.active = true;
    user.ban = None;
}

fn search_document(aggregate: &TopicAggregate) -> SearchDocument {
    SearchDocument {
        topic: aggregate.topic().clone(),
        replies: aggregate
            .replies()
            .walk()
            .into_iter()
            .filter(|(r, _)| !r.deleted && !r.hidden)
            .map(|(r, _)| r.body.clone())
            .collect(),
    }
}

impl Repository {
    /// Empty forum with the member directory and categories loaded.
    pub fn new(options: StoreOptions) -> Self {
        Self {
            state: RwLock::new(ForumState::new(seed::directory(), seed::categories())),
            limiter: RateLimiter::new(options.rate_limit_max, options.rate_limit_window),
            options,
        }
    }

    /// Loads the demo threads.
    pub async fn seed_demo(&self) -> Result<()> {
        let mut state = self.state.write().await;
        seed::demo_threads(&mut state)?;
        state.bump_revision();
        tracing::info!("Seeded {} demo topics", state.topics.len());
        Ok(())
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Get the current revision ID.
    pub async fn revision_id(&self) -> i64 {
        self.state.read().await.revision_id
    }

    pub async fn revision_info(&self) -> RevisionInfo {
        let state = self.state.read().await;
        RevisionInfo {
            revision_id: state.revision_id,
            generated_at: state.generated_at,
        }
    }

    /// Drops rate-limit windows that have run out.
    pub fn purge_rate_limits(&self) {
        self.limiter.purge_expired();
    }

    pub async fn user(&self, id: &str) -> Option<User> {
        self.state.read().await.users.get(id).cloned()
    }

    // ==================== CATEGORIES & TOPICS ====================

    pub async fn list_categories(&self, viewer: Option<&User>) -> Vec<CategorySummary> {
        let state = self.state.read().await;
        let include_hidden = is_moderator(viewer);
        state
            .categories
            .iter()
            .map(|category| {
                let (topic_count, post_count) = state
                    .topics
                    .values()
                    .filter(|a| a.topic().category_id == category.id)
                    .filter(|a| include_hidden || !a.topic().flags.hidden)
                    .fold((0, 0), |(topics, posts), a| {
                        (topics + 1, posts + 1 + a.reply_count())
                    });
                CategorySummary {
                    category: category.clone(),
                    topic_count,
                    post_count,
                }
            })
            .collect()
    }

    /// Topics in a category, pinned first, then by latest activity.
    pub async fn list_topics(
        &self,
        category_id: &str,
        viewer: Option<&User>,
        query: &PageQuery,
    ) -> Result<Page<TopicSummary>> {
        let state = self.state.read().await;
        state.category(category_id)?;
        let include_hidden = is_moderator(viewer);

        let mut topics: Vec<&TopicAggregate> = state
            .topics
            .values()
            .filter(|a| a.topic().category_id == category_id)
            .filter(|a| include_hidden || !a.topic().flags.hidden)
            .collect();
        topics.sort_by(|a, b| {
            let (a, b) = (a.topic(), b.topic());
            b.flags
                .pinned
                .cmp(&a.flags.pinned)
                .then_with(|| b.last_activity_at.cmp(&a.last_activity_at))
        });

        let summaries = topics
            .into_iter()
            .map(|a| a.summary(&view_context(&state, self.options.policy, viewer, a.id())))
            .collect();
        Ok(Page::paginate(summaries, query))
    }

    pub async fn create_topic(
        &self,
        actor: &User,
        category_id: &str,
        request: CreateTopicRequest,
    ) -> Result<Topic> {
        permissions::require(actor, Permission::CreateTopic)?;
        let tags = request.validate()?;

        let mut state = self.state.write().await;
        state.category(category_id)?;
        self.limiter.check(&actor.id, ActionKind::CreateTopic)?;

        let topic = Topic::new(
            Uuid::new_v4().to_string(),
            category_id.to_string(),
            request.title.trim().to_string(),
            request.body,
            actor.author_ref(),
            tags,
            Utc::now(),
        );
        state.read.mark_read(&actor.id, &topic.id);
        state.insert_aggregate(TopicAggregate::new(topic.clone()));
        state.bump_revision();

        tracing::info!(topic_id = %topic.id, category_id, author = %actor.username, "topic created");
        Ok(topic)
    }

    /// Thread view for one viewer. Counts a view and marks the topic read.
    pub async fn view_topic(&self, id_or_slug: &str, viewer: Option<&User>) -> Result<TopicView> {
        let mut state = self.state.write().await;
        let topic_id = resolve_topic_id(&state, id_or_slug)?;

        let aggregate = state.aggregate_mut(&topic_id)?;
        if aggregate.topic().flags.hidden && !is_moderator(viewer) {
            return Err(AppError::not_found("Topic", id_or_slug));
        }
        aggregate.record_view();
        if let Some(user) = viewer {
            state.read.mark_read(&user.id, &topic_id);
        }

        let ctx = view_context(&state, self.options.policy, viewer, &topic_id);
        Ok(state.aggregate(&topic_id)?.view(&ctx))
    }

    pub async fn visible_topic(&self, topic_id: &str, viewer: Option<&User>) -> Option<Topic> {
        let state = self.state.read().await;
        let topic = state.topics.get(topic_id)?.topic();
        (!topic.flags.hidden || is_moderator(viewer)).then(|| topic.clone())
    }

    pub async fn edit_topic(
        &self,
        actor: &User,
        topic_id: &str,
        request: UpdateTopicRequest,
    ) -> Result<Topic> {
        let tags = request.validate()?;
        let moderator = is_moderator(Some(actor));

        let mut state = self.state.write().await;
        let aggregate = state.aggregate_mut(topic_id)?;
        if !permissions::can_edit(actor, &aggregate.topic().author.id) {
            return Err(AppError::Forbidden(
                "You can only edit your own topics".to_string(),
            ));
        }
        if aggregate.topic().flags.locked && !moderator {
            return Err(AppError::Locked(format!("Topic {} is locked", topic_id)));
        }
        let topic = aggregate
            .edit(
                request.title.map(|t| t.trim().to_string()),
                request.body,
                tags,
                Utc::now(),
            )
            .clone();
        state.bump_revision();

        tracing::info!(topic_id, editor = %actor.username, "topic edited");
        Ok(topic)
    }

    // ==================== REPLIES ====================

    pub async fn create_reply(
        &self,
        actor: &User,
        topic_id: &str,
        request: CreateReplyRequest,
    ) -> Result<Reply> {
        permissions::require(actor, Permission::CreateReply)?;
        request.validate()?;
        let moderator = is_moderator(Some(actor));

        let mut state = self.state.write().await;
        let (reply, replied_to) = {
            let aggregate = state.aggregate(topic_id)?;
            let topic = aggregate.topic();
            if topic.flags.hidden && !moderator {
                return Err(AppError::not_found("Topic", topic_id));
            }
            if topic.flags.locked && !moderator {
                return Err(AppError::Locked(format!(
                    "Topic {} is locked and no longer accepts replies",
                    topic_id
                )));
            }

            let replied_to = match request.parent_id.as_deref() {
                None => topic.author.clone(),
                Some(parent_id) => {
                    let parent = aggregate
                        .replies()
                        .get(parent_id)
                        .ok_or_else(|| AppError::not_found("Parent reply", parent_id))?;
                    if parent.deleted {
                        return Err(AppError::Validation(
                            "Cannot reply to a deleted reply".to_string(),
                        ));
                    }
                    let depth = aggregate
                        .replies()
                        .depth(parent_id)
                        .ok_or_else(|| AppError::not_found("Parent reply", parent_id))?;
                    if !self.options.policy.can_reply_under(depth) {
                        return Err(AppError::Validation(format!(
                            "Replies cannot be nested deeper than {} levels",
                            self.options.policy.max_reply_depth
                        )));
                    }
                    parent.author.clone()
                }
            };

            let quoted_reply = match request.quote_of.as_deref() {
                None => None,
                Some(quoted_id) => {
                    let source = aggregate
                        .replies()
                        .get(quoted_id)
                        .filter(|r| !r.hidden || moderator)
                        .ok_or_else(|| AppError::not_found("Reply", quoted_id))?;
                    Some(QuoteSnapshot::capture(source, self.options.quote_chars)?)
                }
            };

            let mut reply = Reply::new(
                Uuid::new_v4().to_string(),
                topic_id.to_string(),
                actor.author_ref(),
                request.body.clone(),
                Utc::now(),
            );
            reply.quoted_reply = quoted_reply;
            reply.attachments = request.attachments.clone();
            (reply, replied_to)
        };

        self.limiter.check(&actor.id, ActionKind::CreateReply)?;

        let reply_id = reply.id.clone();
        let aggregate = state.aggregate_mut(topic_id)?;
        let depth = aggregate.add_reply(request.parent_id.as_deref(), reply)?;
        let topic = aggregate.topic().clone();
        let reply = aggregate
            .replies()
            .get(&reply_id)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("Reply {} vanished", reply_id)))?;
        state
            .reply_topics
            .insert(reply_id.clone(), topic_id.to_string());

        let mentioned: Vec<_> = mentions(&reply.body)
            .iter()
            .filter_map(|name| state.user_by_username(name))
            .filter(|u| u.active && !u.banned)
            .map(User::author_ref)
            .collect();
        let notified = state
            .notifications
            .deliver_reply(&topic, &replied_to, &reply, &mentioned);
        state.read.mark_unread_for_all_except(topic_id, &actor.id);
        state.read.mark_read(&actor.id, topic_id);
        state.bump_revision();

        tracing::info!(reply_id = %reply.id, topic_id, depth, notified, "reply created");
        Ok(reply)
    }

    pub async fn edit_reply(
        &self,
        actor: &User,
        reply_id: &str,
        request: UpdateReplyRequest,
    ) -> Result<Reply> {
        request.validate()?;
        let moderator = is_moderator(Some(actor));

        let mut state = self.state.write().await;
        let topic_id = topic_of_reply(&state, reply_id)?;
        let aggregate = state.aggregate_mut(&topic_id)?;
        let author_id = aggregate
            .replies()
            .get(reply_id)
            .map(|r| r.author.id.clone())
            .ok_or_else(|| AppError::not_found("Reply", reply_id))?;
        if !permissions::can_edit(actor, &author_id) {
            return Err(AppError::Forbidden(
                "You can only edit your own replies".to_string(),
            ));
        }
        if aggregate.topic().flags.locked && !moderator {
            return Err(AppError::Locked(format!("Topic {} is locked", topic_id)));
        }
        let reply = aggregate
            .edit_reply(reply_id, request.body, Utc::now())?
            .clone();
        state.bump_revision();

        tracing::info!(reply_id, topic_id = %topic_id, editor = %actor.username, "reply edited");
        Ok(reply)
    }

    /// Tombstones a reply. Its replies stay in place.
    pub async fn delete_reply(&self, actor: &User, reply_id: &str) -> Result<Reply> {
        let mut state = self.state.write().await;
        let topic_id = topic_of_reply(&state, reply_id)?;
        let aggregate = state.aggregate_mut(&topic_id)?;
        let author_id = aggregate
            .replies()
            .get(reply_id)
            .map(|r| r.author.id.clone())
            .ok_or_else(|| AppError::not_found("Reply", reply_id))?;
        if !permissions::can_delete(actor, &author_id) {
            return Err(AppError::Forbidden(
                "You can only delete your own replies".to_string(),
            ));
        }
        aggregate.delete_reply(reply_id, Utc::now())?;
        let reply = aggregate
            .replies()
            .get(reply_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Reply", reply_id))?;
        state.bump_revision();

        tracing::info!(reply_id, topic_id = %topic_id, by = %actor.username, "reply deleted");
        Ok(reply)
    }

    pub async fn quote_reply(&self, reply_id: &str, viewer: Option<&User>) -> Result<QuoteSnapshot> {
        let state = self.state.read().await;
        let topic_id = topic_of_reply(&state, reply_id)?;
        let aggregate = state.aggregate(&topic_id)?;
        let moderator = is_moderator(viewer);
        let reply = aggregate
            .replies()
            .get(reply_id)
            .filter(|r| moderator || (!r.hidden && !aggregate.topic().flags.hidden))
            .ok_or_else(|| AppError::not_found("Reply", reply_id))?;
        QuoteSnapshot::capture(reply, self.options.quote_chars)
    }

    // ==================== VOTES ====================

    pub async fn vote(
        &self,
        actor: &User,
        content_id: &str,
        request: SubmitVoteRequest,
    ) -> Result<VoteOutcome> {
        permissions::require_member(actor)?;
        let command = request.command()?;

        let mut state = self.state.write().await;
        let topic_id = state.topic_of(content_id)?;
        let outcome = apply_vote(
            &mut state,
            actor,
            &topic_id,
            content_id,
            command,
            request.request_id,
        )?;
        state.bump_revision();
        Ok(outcome)
    }

    // ==================== MODERATION ====================

    pub async fn moderate(
        &self,
        actor: &User,
        content_type: ContentType,
        content_id: &str,
        action: ModerationAction,
    ) -> Result<ModerationResult> {
        permissions::require(actor, Permission::for_action(&action))?;

        let mut state = self.state.write().await;
        let topic_id = match content_type {
            ContentType::Topic => {
                state.aggregate(content_id)?;
                content_id.to_string()
            }
            ContentType::Reply => topic_of_reply(&state, content_id)?,
        };
        if let ModerationAction::Move { category_id } = &action {
            state.category(category_id)?;
        }

        let effect = state
            .aggregate_mut(&topic_id)?
            .apply_moderation(content_id, &action, Utc::now())?;
        let removed = effect == ModerationEffect::TopicRemoved;

        let (topic, reply) = if removed {
            state.remove_aggregate(&topic_id);
            (None, None)
        } else {
            let aggregate = state.aggregate(&topic_id)?;
            let reply = match content_type {
                ContentType::Reply => aggregate.replies().get(content_id).cloned(),
                ContentType::Topic => None,
            };
            (Some(aggregate.topic().clone()), reply)
        };
        if let ModerationEffect::Moved { from } = &effect {
            tracing::info!(topic_id = %topic_id, from = %from, "topic moved");
        }
        state.bump_revision();

        tracing::info!(
            moderator = %actor.username,
            action = action.name(),
            content_id,
            "moderation applied"
        );
        Ok(ModerationResult {
            content_type,
            content_id: content_id.to_string(),
            action: action.name().to_string(),
            topic,
            reply,
            removed,
        })
    }

    pub async fn submit_report(&self, actor: &User, request: CreateReportRequest) -> Result<Report> {
        permissions::require_member(actor)?;
        request.validate()?;

        let mut state = self.state.write().await;
        let topic_id = match request.content_type {
            ContentType::Topic => {
                state.aggregate(&request.content_id)?;
                request.content_id.clone()
            }
            ContentType::Reply => topic_of_reply(&state, &request.content_id)?,
        };
        self.limiter.check(&actor.id, ActionKind::SubmitReport)?;

        let report = state
            .reports
            .submit(request, topic_id, actor.author_ref(), Utc::now());
        state.bump_revision();

        tracing::info!(report_id = %report.id, content_id = %report.content_id, "report submitted");
        Ok(report)
    }

    pub async fn list_reports(&self, actor: &User, status: Option<ReportStatus>) -> Result<Vec<Report>> {
        permissions::require(actor, Permission::ViewReports)?;
        Ok(self.state.read().await.reports.list(status))
    }

    /// Pending report count, for members who may see the queue.
    pub async fn pending_report_count(&self, actor: &User) -> Option<usize> {
        if !permissions::has_permission(actor, Permission::ViewReports) {
            return None;
        }
        Some(self.state.read().await.reports.pending_count())
    }

    /// Resolves a report. `hide` also hides the reported content.
    pub async fn resolve_report(
        &self,
        actor: &User,
        report_id: &str,
        resolution: ReportResolution,
    ) -> Result<Report> {
        permissions::require(actor, Permission::ViewReports)?;

        let mut state = self.state.write().await;
        let now = Utc::now();
        let report = state.reports.resolve(report_id, resolution, now)?;
        if resolution == ReportResolution::Hide {
            let hidden = state
                .aggregate_mut(&report.topic_id)
                .and_then(|a| a.apply_moderation(&report.content_id, &ModerationAction::Hide, now));
            if let Err(err) = hidden {
                tracing::warn!(report_id, error = %err, "reported content could not be hidden");
            }
        }
        state.bump_revision();

        tracing::info!(report_id, ?resolution, moderator = %actor.username, "report resolved");
        Ok(report)
    }

    // ==================== READ STATUS & BOOKMARKS ====================

    pub async fn set_read(&self, actor: &User, topic_id: &str, is_read: bool) -> Result<bool> {
        let mut state = self.state.write().await;
        state.aggregate(topic_id)?;
        let is_read = state.read.toggle(&actor.id, topic_id, is_read);
        state.bump_revision();
        Ok(is_read)
    }

    /// The caller's bookmarked topics that they can still see.
    pub async fn bookmarked_topics(&self, actor: &User) -> Vec<TopicSummary> {
        let state = self.state.read().await;
        let include_hidden = is_moderator(Some(actor));
        state
            .bookmarks
            .list(&actor.id)
            .iter()
            .filter_map(|id| state.topics.get(id))
            .filter(|a| include_hidden || !a.topic().flags.hidden)
            .map(|a| a.summary(&view_context(&state, self.options.policy, Some(actor), a.id())))
            .collect()
    }

    pub async fn toggle_bookmark(&self, actor: &User, topic_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        state.aggregate(topic_id)?;
        let bookmarked = state.bookmarks.toggle(&actor.id, topic_id);
        state.bump_revision();
        Ok(bookmarked)
    }

    // ==================== NOTIFICATIONS ====================

    pub async fn notifications(&self, actor: &User) -> NotificationFeed {
        self.state.read().await.notifications.feed(&actor.id)
    }

    pub async fn mark_notification_read(&self, actor: &User, notification_id: &str) -> Result<Notification> {
        let mut state = self.state.write().await;
        let notification = state.notifications.mark_read(&actor.id, notification_id)?;
        state.bump_revision();
        Ok(notification)
    }

    pub async fn mark_all_notifications_read(&self, actor: &User) -> usize {
        let mut state = self.state.write().await;
        let changed = state.notifications.mark_all_read(&actor.id);
        if changed > 0 {
            state.bump_revision();
        }
        changed
    }

    // ==================== MESSAGES ====================

    pub async fn messages(&self, actor: &User, query: Option<&str>) -> MessageFeed {
        self.state.read().await.messages.feed(&actor.id, query)
    }

    pub async fn unread_message_count(&self, actor: &User) -> usize {
        self.state.read().await.messages.unread_total(&actor.id)
    }

    pub async fn send_message(&self, actor: &User, request: SendMessageRequest) -> Result<Message> {
        permissions::require_member(actor)?;
        request.validate()?;

        let mut state = self.state.write().await;
        let recipient = state.author(request.recipient_id.trim())?;
        self.limiter.check(&actor.id, ActionKind::SendMessage)?;

        let message = state
            .messages
            .send(&actor.author_ref(), &recipient, &request.body, Utc::now())?;
        state.bump_revision();

        tracing::info!(
            conversation_id = %message.conversation_id,
            sender = %actor.username,
            recipient = %recipient.username,
            "message sent"
        );
        Ok(message)
    }

    pub async fn reply_message(
        &self,
        actor: &User,
        conversation_id: &str,
        request: ReplyMessageRequest,
    ) -> Result<Message> {
        permissions::require_member(actor)?;
        request.validate()?;

        let mut state = self.state.write().await;
        let recipient = state.messages.counterpart(&actor.id, conversation_id)?.username.clone();
        self.limiter.check(&actor.id, ActionKind::SendMessage)?;

        let message = state
            .messages
            .reply(&actor.author_ref(), conversation_id, &request.body, Utc::now())?;
        state.bump_revision();

        tracing::info!(conversation_id, sender = %actor.username, %recipient, "message sent");
        Ok(message)
    }

    /// Opening a conversation marks incoming messages read. Like viewing a
    /// topic, this does not move the revision.
    pub async fn open_conversation(&self, actor: &User, conversation_id: &str) -> Result<ConversationThread> {
        self.state.write().await.messages.open(&actor.id, conversation_id)
    }

    // ==================== MEMBER MANAGEMENT ====================

    pub async fn list_users(&self, actor: &User, query: &UserQuery) -> Result<Vec<User>> {
        permissions::require(actor, Permission::ManageUsers)?;
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .filter(|u| query.matches(u))
            .cloned()
            .collect())
    }

    pub async fn change_role(&self, actor: &User, user_id: &str, role: UserRole) -> Result<User> {
        permissions::require(actor, Permission::ManageRoles)?;

        let mut state = self.state.write().await;
        let target = state.user_mut(user_id)?;
        if actor.id == target.id {
            return Err(AppError::Forbidden(
                "You cannot change your own role".to_string(),
            ));
        }
        let previous = target.role;
        target.role = role;
        let updated = target.clone();
        state.bump_revision();

        tracing::info!(user_id, ?previous, ?role, admin = %actor.username, "role changed");
        Ok(updated)
    }

    pub async fn ban_user(&self, actor: &User, user_id: &str, request: BanRequest) -> Result<User> {
        permissions::require(actor, Permission::ModerateUsers)?;
        request.validate()?;

        let mut state = self.state.write().await;
        let target = state.user_mut(user_id)?;
        require_outranks(actor, target)?;
        if target.banned {
            return Err(AppError::Conflict(format!("{} is already banned", target.username)));
        }

        let now = Utc::now();
        target.banned = true;
        target.active = false;
        target.ban = Some(Ban {
            reason: request.reason.trim().to_string(),
            banned_by: actor.username.clone(),
            banned_at: now,
            expires_at: request
                .duration_days
                .map(|days| now + chrono::Duration::days(i64::from(days))),
        });
        let banned = target.clone();
        state.bump_revision();

        tracing::info!(user_id, days = ?request.duration_days, moderator = %actor.username, "member banned");
        Ok(banned)
    }

    pub async fn unban_user(&self, actor: &User, user_id: &str) -> Result<User> {
        permissions::require(actor, Permission::ModerateUsers)?;

        let mut state = self.state.write().await;
        let target = state.user_mut(user_id)?;
        require_outranks(actor, target)?;
        if !target.banned {
            return Err(AppError::Conflict(format!("{} is not banned", target.username)));
        }
        lift_ban(target);
        let unbanned = target.clone();
        state.bump_revision();

        tracing::info!(user_id, moderator = %actor.username, "member unbanned");
        Ok(unbanned)
    }

    /// Lifts timed bans that have run out. Returns how many were lifted.
    pub async fn lift_expired_bans(&self) -> usize {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut lifted = 0;
        for user in state.users.values_mut().filter(|u| u.ban_expired(now)) {
            lift_ban(user);
            tracing::info!(user_id = %user.id, "ban expired");
            lifted += 1;
        }
        if lifted > 0 {
            state.bump_revision();
        }
        lifted
    }

    // ==================== SEARCH FEED ====================

    pub async fn search_document(&self, topic_id: &str) -> Option<SearchDocument> {
        self.state.read().await.topics.get(topic_id).map(search_document)
    }

    pub async fn search_documents(&self) -> Vec<SearchDocument> {
        self.state
            .read()
            .await
            .topics
            .values()
            .map(search_document)
            .collect()
    }
}

#[async_trait]
impl ForumGateway for Repository {
    async fn submit_reply(
        &self,
        user_id: &str,
        topic_id: &str,
        request: CreateReplyRequest,
    ) -> Result<Reply> {
        let actor = self
            .user(user_id)
            .await
            .ok_or_else(|| AppError::Unauthorized(format!("Unknown user {}", user_id)))?;
        self.create_reply(&actor, topic_id, request).await
    }

    async fn submit_vote(
        &self,
        user_id: &str,
        topic_id: &str,
        content_id: &str,
        target: VoteState,
        request_id: Uuid,
    ) -> Result<VoteOutcome> {
        let actor = self
            .user(user_id)
            .await
            .ok_or_else(|| AppError::Unauthorized(format!("Unknown user {}", user_id)))?;
        permissions::require_member(&actor)?;

        let mut state = self.state.write().await;
        if state.topic_of(content_id)? != topic_id {
            return Err(AppError::not_found("Content", content_id));
        }
        let outcome = apply_vote(
            &mut state,
            &actor,
            topic_id,
            content_id,
            VoteCommand::Set(target),
            Some(request_id),
        )?;
        state.bump_revision();
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::{DiscussionSession, VoteType};
    use crate::models::{NotificationKind, ReportReason};
    use crate::store::seed::{DEMO_NESTED_REPLY_ID, DEMO_REPLY_ID, DEMO_TOPIC_ID};
    use std::sync::Arc;

    async fn repo() -> Repository {
        let repo = Repository::new(StoreOptions::default());
        repo.seed_demo().await.unwrap();
        repo
    }

    async fn user(repo: &Repository, id: &str) -> User {
        repo.user(id).await.unwrap()
    }

    fn reply_request(body: &str, parent_id: Option<&str>) -> CreateReplyRequest {
        CreateReplyRequest {
            body: body.to_string(),
            parent_id: parent_id.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_view_by_slug_marks_read() {
        let repo = repo().await;
        let sarah = user(&repo, "1").await;
        let slug = repo.visible_topic(DEMO_TOPIC_ID, None).await.unwrap().slug;

        let view = repo.view_topic(&slug, Some(&sarah)).await.unwrap();

        assert_eq!(view.topic.id, DEMO_TOPIC_ID);
        assert_eq!(view.score, 42);
        assert_eq!(view.topic.views, 157);
        assert_eq!(view.replies[0].replies[0].reply.id, DEMO_NESTED_REPLY_ID);
        assert_eq!(view.replies[0].replies[0].depth, 2);

        let page = repo
            .list_topics("community-projects", Some(&sarah), &PageQuery::default())
            .await
            .unwrap();
        assert!(page.items[0].is_read);
    }

    #[tokio::test]
    async fn test_reply_under_unknown_parent() {
        let repo = repo().await;
        let sarah = user(&repo, "1").await;
        let revision = repo.revision_id().await;

        let err = repo
            .create_reply(&sarah, DEMO_TOPIC_ID, reply_request("hi", Some("missing")))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(repo.revision_id().await, revision);
        let view = repo.view_topic(DEMO_TOPIC_ID, None).await.unwrap();
        assert_eq!(view.reply_count, 2);
    }

    #[tokio::test]
    async fn test_reply_notifies_parent_author_and_mentions() {
        let repo = repo().await;
        let michael = user(&repo, "2").await;

        let reply = repo
            .create_reply(
                &michael,
                DEMO_TOPIC_ID,
                reply_request("Sounds good, @taylor-wilson can you help?", Some(DEMO_NESTED_REPLY_ID)),
            )
            .await
            .unwrap();
        assert_eq!(reply.parent_id.as_deref(), Some(DEMO_NESTED_REPLY_ID));

        let sarah_feed = repo.notifications(&user(&repo, "1").await).await;
        assert_eq!(sarah_feed.unread_count, 1);
        assert_eq!(sarah_feed.items[0].kind, NotificationKind::Reply);

        let taylor_feed = repo.notifications(&user(&repo, "3").await).await;
        assert_eq!(taylor_feed.items[0].kind, NotificationKind::Mention);
        assert!(repo.notifications(&michael).await.items.is_empty());
    }

    #[tokio::test]
    async fn test_depth_policy_enforced() {
        let repo = Repository::new(StoreOptions {
            policy: ThreadPolicy { max_reply_depth: 2 },
            ..Default::default()
        });
        repo.seed_demo().await.unwrap();
        let sarah = user(&repo, "1").await;

        // The nested demo reply sits at depth 2.
        let deep = repo
            .create_reply(&sarah, DEMO_TOPIC_ID, reply_request("third", Some(DEMO_NESTED_REPLY_ID)))
            .await
            .unwrap();
        let err = repo
            .create_reply(&sarah, DEMO_TOPIC_ID, reply_request("fourth", Some(&deep.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_locked_topic_rejects_replies() {
        let repo = repo().await;
        let taylor = user(&repo, "3").await;
        let sarah = user(&repo, "1").await;

        repo.moderate(&taylor, ContentType::Topic, DEMO_TOPIC_ID, ModerationAction::Lock)
            .await
            .unwrap();
        let err = repo
            .create_reply(&sarah, DEMO_TOPIC_ID, reply_request("late", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Locked(_)));

        let err = repo
            .moderate(&sarah, ContentType::Topic, DEMO_TOPIC_ID, ModerationAction::Unlock)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_reply_rate_limit() {
        let repo = Repository::new(StoreOptions {
            rate_limit_max: 2,
            ..Default::default()
        });
        repo.seed_demo().await.unwrap();
        let sarah = user(&repo, "1").await;

        for body in ["one", "two"] {
            repo.create_reply(&sarah, DEMO_TOPIC_ID, reply_request(body, None))
                .await
                .unwrap();
        }
        let err = repo
            .create_reply(&sarah, DEMO_TOPIC_ID, reply_request("three", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_vote_toggle_and_retry() {
        let repo = repo().await;
        let michael = user(&repo, "2").await;
        let request_id = Uuid::new_v4();
        let request = || SubmitVoteRequest {
            vote: Some(VoteType::Up),
            target: None,
            request_id: Some(request_id),
        };

        let first = repo.vote(&michael, DEMO_REPLY_ID, request()).await.unwrap();
        let retry = repo.vote(&michael, DEMO_REPLY_ID, request()).await.unwrap();
        assert_eq!(first.score, 19);
        assert_eq!(retry, first);
    }

    #[tokio::test]
    async fn test_delete_topic_removes_everything() {
        let repo = repo().await;
        let jamie = user(&repo, "4").await;
        let sarah = user(&repo, "1").await;
        repo.submit_report(
            &sarah,
            CreateReportRequest {
                content_type: ContentType::Reply,
                content_id: DEMO_REPLY_ID.to_string(),
                reason: ReportReason::OffTopic,
                details: None,
            },
        )
        .await
        .unwrap();

        let result = repo
            .moderate(
                &jamie,
                ContentType::Topic,
                DEMO_TOPIC_ID,
                ModerationAction::Delete { reason: None },
            )
            .await
            .unwrap();

        assert!(result.removed);
        assert!(repo.visible_topic(DEMO_TOPIC_ID, Some(&jamie)).await.is_none());
        assert!(repo.list_reports(&jamie, None).await.unwrap().is_empty());
        assert!(matches!(
            repo.quote_reply(DEMO_REPLY_ID, None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_with_hide() {
        let repo = repo().await;
        let sarah = user(&repo, "1").await;
        let taylor = user(&repo, "3").await;
        let report = repo
            .submit_report(
                &sarah,
                CreateReportRequest {
                    content_type: ContentType::Reply,
                    content_id: DEMO_REPLY_ID.to_string(),
                    reason: ReportReason::Spam,
                    details: None,
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            repo.list_reports(&sarah, None).await,
            Err(AppError::Forbidden(_))
        ));
        repo.resolve_report(&taylor, &report.id, ReportResolution::Hide)
            .await
            .unwrap();
        assert!(matches!(
            repo.resolve_report(&taylor, &report.id, ReportResolution::Dismiss).await,
            Err(AppError::Conflict(_))
        ));

        let view = repo.view_topic(DEMO_TOPIC_ID, Some(&sarah)).await.unwrap();
        assert!(view.replies[0].reply.hidden);
        assert!(view.replies[0].reply.body.is_empty());
    }

    #[tokio::test]
    async fn test_session_against_repository() {
        let repo = Arc::new(repo().await);
        let michael = user(&repo, "2").await;
        let view = repo.view_topic(DEMO_TOPIC_ID, Some(&michael)).await.unwrap();
        let session = DiscussionSession::new(repo.clone(), michael.author_ref(), &view);

        let outcome = session.vote(DEMO_TOPIC_ID, VoteType::Down).await.unwrap();
        assert_eq!(outcome.score, 41);
        assert_eq!(session.score(DEMO_TOPIC_ID), 41);

        let reply = session
            .reply(Some(DEMO_REPLY_ID), "Following up on the water question", Some(DEMO_REPLY_ID))
            .await
            .unwrap();
        assert_eq!(session.children(Some(DEMO_REPLY_ID)).last(), Some(&reply.id));
        assert!(reply.quoted_reply.is_some());

        let server = repo.view_topic(DEMO_TOPIC_ID, Some(&michael)).await.unwrap();
        assert_eq!(server.score, 41);
        assert_eq!(server.user_vote, VoteState::Down);
        assert_eq!(server.replies[0].replies.len(), 2);
    }

    fn message(recipient_id: &str, body: &str) -> SendMessageRequest {
        SendMessageRequest {
            recipient_id: recipient_id.to_string(),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_private_messages() {
        let repo = repo().await;
        let sarah = user(&repo, "1").await;
        let michael = user(&repo, "2").await;
        let taylor = user(&repo, "3").await;

        let revision = repo.revision_id().await;
        let sent = repo
            .send_message(&sarah, message("2", "Want a garden plot?"))
            .await
            .unwrap();
        assert_eq!(repo.revision_id().await, revision + 1);
        assert_eq!(repo.unread_message_count(&michael).await, 1);

        repo.reply_message(
            &michael,
            &sent.conversation_id,
            ReplyMessageRequest {
                body: "Yes please".to_string(),
            },
        )
        .await
        .unwrap();

        let revision = repo.revision_id().await;
        let thread = repo.open_conversation(&michael, &sent.conversation_id).await.unwrap();
        assert_eq!(thread.participant.id, "1");
        assert_eq!(thread.messages.len(), 2);
        assert_eq!(repo.unread_message_count(&michael).await, 0);
        assert_eq!(repo.unread_message_count(&sarah).await, 1);
        assert_eq!(repo.revision_id().await, revision);

        assert!(matches!(
            repo.open_conversation(&taylor, &sent.conversation_id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(repo.messages(&taylor, None).await.conversations.is_empty());
    }

    #[tokio::test]
    async fn test_message_rejections() {
        let repo = repo().await;
        let sarah = user(&repo, "1").await;
        let spammer = user(&repo, "5").await;

        assert!(matches!(
            repo.send_message(&spammer, message("1", "cheap deals")).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            repo.send_message(&sarah, message("42", "hello?")).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            repo.send_message(&sarah, message("1", "note to self")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            repo.send_message(&sarah, message("2", "  ")).await,
            Err(AppError::Validation(_))
        ));
    }

    fn ban(days: Option<u32>) -> BanRequest {
        BanRequest {
            reason: "Off-topic advertising".to_string(),
            duration_days: days,
        }
    }

    #[tokio::test]
    async fn test_ban_and_unban() {
        let repo = repo().await;
        let sarah = user(&repo, "1").await;
        let taylor = user(&repo, "3").await;
        let jamie = user(&repo, "4").await;

        assert!(matches!(
            repo.ban_user(&sarah, "2", ban(Some(7))).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            repo.ban_user(&taylor, "4", ban(Some(7))).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            repo.ban_user(&taylor, "3", ban(Some(7))).await,
            Err(AppError::Forbidden(_))
        ));

        let banned = repo.ban_user(&taylor, "1", ban(Some(7))).await.unwrap();
        assert!(banned.banned && !banned.active);
        assert!(banned.ban.as_ref().and_then(|b| b.expires_at).is_some());
        assert!(matches!(
            repo.ban_user(&taylor, "1", ban(None)).await,
            Err(AppError::Conflict(_))
        ));

        let sarah = user(&repo, "1").await;
        assert!(matches!(
            repo.create_reply(&sarah, DEMO_TOPIC_ID, reply_request("still here", None)).await,
            Err(AppError::Forbidden(_))
        ));

        let restored = repo.unban_user(&jamie, "1").await.unwrap();
        assert!(!restored.banned && restored.active && restored.ban.is_none());
        assert!(matches!(
            repo.unban_user(&jamie, "1").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_bans_are_lifted() {
        let repo = repo().await;
        let jamie = user(&repo, "4").await;
        repo.ban_user(&jamie, "2", ban(Some(1))).await.unwrap();
        assert_eq!(repo.lift_expired_bans().await, 0);

        if let Some(ban) = repo
            .state
            .write()
            .await
            .users
            .get_mut("2")
            .and_then(|u| u.ban.as_mut())
        {
            ban.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        }

        assert_eq!(repo.lift_expired_bans().await, 1);
        assert!(!user(&repo, "2").await.banned);
        // The seeded ban has no expiry.
        assert!(user(&repo, "5").await.banned);
    }

    #[tokio::test]
    async fn test_roles_and_directory() {
        let repo = repo().await;
        let taylor = user(&repo, "3").await;
        let jamie = user(&repo, "4").await;

        assert!(matches!(
            repo.change_role(&taylor, "2", UserRole::Moderator).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            repo.change_role(&jamie, "4", UserRole::User).await,
            Err(AppError::Forbidden(_))
        ));

        let promoted = repo.change_role(&jamie, "2", UserRole::Moderator).await.unwrap();
        assert_eq!(promoted.role, UserRole::Moderator);
        assert_eq!(repo.pending_report_count(&promoted).await, Some(0));

        assert!(matches!(
            repo.list_users(&taylor, &UserQuery::default()).await,
            Err(AppError::Forbidden(_))
        ));
        let banned = repo
            .list_users(
                &jamie,
                &UserQuery {
                    status: Some(crate::models::UserStatus::Banned),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(banned.len(), 1);
        assert_eq!(banned[0].id, "5");
    }
}
