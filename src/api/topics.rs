//! Topic API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{error, reindex, success, ApiResult};
use crate::auth::{CurrentUser, MaybeUser};
use crate::models::{
    ContentType, CreateReplyRequest, ModerationAction, ModerationResult, Reply, Topic, TopicView,
    UpdateTopicRequest,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadStatusRequest {
    pub is_read: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadStatus {
    pub topic_id: String,
    pub is_read: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkStatus {
    pub topic_id: String,
    pub bookmarked: bool,
}

/// GET /api/topics/:id - Thread view. Accepts the topic id or its slug.
pub async fn get_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    MaybeUser(viewer): MaybeUser,
) -> ApiResult<TopicView> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.view_topic(&id, viewer.as_ref()).await {
        Ok(view) => success(view, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/topics/:id - Edit title, body or tags.
pub async fn update_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<UpdateTopicRequest>,
) -> ApiResult<Topic> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.edit_topic(&user, &id, request).await {
        Ok(topic) => {
            reindex(&state, &topic.id).await;
            success(topic, state.repo.revision_id().await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/topics/:id/replies - Post a reply at the root or under `parentId`.
pub async fn create_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateReplyRequest>,
) -> ApiResult<Reply> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.create_reply(&user, &id, request).await {
        Ok(reply) => {
            reindex(&state, &id).await;
            success(reply, state.repo.revision_id().await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/topics/:id/moderation - Lock, pin, move, hide or delete a topic.
pub async fn moderate_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(action): Json<ModerationAction>,
) -> ApiResult<ModerationResult> {
    let revision_id = state.repo.revision_id().await;

    match state
        .repo
        .moderate(&user, ContentType::Topic, &id, action)
        .await
    {
        Ok(result) => {
            reindex(&state, &id).await;
            success(result, state.repo.revision_id().await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/topics/:id/read - Mark read or unread for the caller.
pub async fn set_read_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ReadStatusRequest>,
) -> ApiResult<ReadStatus> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.set_read(&user, &id, request.is_read).await {
        Ok(is_read) => success(
            ReadStatus {
                topic_id: id,
                is_read,
            },
            state.repo.revision_id().await,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/topics/:id/bookmark - Toggle the caller's bookmark.
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<BookmarkStatus> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.toggle_bookmark(&user, &id).await {
        Ok(bookmarked) => success(
            BookmarkStatus {
                topic_id: id,
                bookmarked,
            },
            state.repo.revision_id().await,
        ),
        Err(e) => error(e, revision_id),
    }
}
