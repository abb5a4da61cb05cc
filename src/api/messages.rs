//! Private message endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::auth::CurrentUser;
use crate::models::{
    ConversationThread, Message, MessageFeed, MessageQuery, ReplyMessageRequest,
    SendMessageRequest,
};
use crate::AppState;

/// GET /api/messages?q - The caller's conversations, most recent first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<MessageFeed> {
    let revision_id = state.repo.revision_id().await;
    success(state.repo.messages(&user, query.q.as_deref()).await, revision_id)
}

/// POST /api/messages - Message a member, opening a conversation if needed.
pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Message> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.send_message(&user, request).await {
        Ok(message) => success(message, state.repo.revision_id().await),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/messages/:id - Full conversation; marks incoming messages read.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<ConversationThread> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.open_conversation(&user, &id).await {
        Ok(thread) => success(thread, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/messages/:id - Answer inside a conversation.
pub async fn reply_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ReplyMessageRequest>,
) -> ApiResult<Message> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.reply_message(&user, &id, request).await {
        Ok(message) => success(message, state.repo.revision_id().await),
        Err(e) => error(e, revision_id),
    }
}
