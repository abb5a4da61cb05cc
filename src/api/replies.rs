//! Reply API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, reindex, success, ApiResult};
use crate::auth::{CurrentUser, MaybeUser};
use crate::models::{
    ContentType, ModerationAction, ModerationResult, QuoteSnapshot, Reply, UpdateReplyRequest,
};
use crate::AppState;

/// PUT /api/replies/:id - Edit a reply body.
pub async fn update_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<UpdateReplyRequest>,
) -> ApiResult<Reply> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.edit_reply(&user, &id, request).await {
        Ok(reply) => {
            reindex(&state, &reply.topic_id).await;
            success(reply, state.repo.revision_id().await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/replies/:id - Tombstone a reply.
pub async fn delete_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Reply> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.delete_reply(&user, &id).await {
        Ok(reply) => {
            reindex(&state, &reply.topic_id).await;
            success(reply, state.repo.revision_id().await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/replies/:id/quote - Snapshot to quote in a new reply.
pub async fn quote_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    MaybeUser(viewer): MaybeUser,
) -> ApiResult<QuoteSnapshot> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.quote_reply(&id, viewer.as_ref()).await {
        Ok(quote) => success(quote, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/replies/:id/moderation - Hide, show or delete a reply.
pub async fn moderate_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(action): Json<ModerationAction>,
) -> ApiResult<ModerationResult> {
    let revision_id = state.repo.revision_id().await;

    match state
        .repo
        .moderate(&user, ContentType::Reply, &id, action)
        .await
    {
        Ok(result) => {
            if let Some(topic) = &result.topic {
                reindex(&state, &topic.id).await;
            }
            success(result, state.repo.revision_id().await)
        }
        Err(e) => error(e, revision_id),
    }
}
