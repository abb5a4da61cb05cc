//! Caller identity and revision endpoints.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::auth::permissions::{self, Permission};
use crate::auth::CurrentUser;
use crate::models::{RevisionInfo, TopicSummary, User};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Me {
    pub user: User,
    pub permissions: Vec<Permission>,
    /// Only present for members who can work the report queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_reports: Option<usize>,
    pub unread_messages: usize,
}

/// GET /api/me - The acting member and what they may do.
pub async fn get_me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Me> {
    let revision_id = state.repo.revision_id().await;
    let permissions = permissions::permissions_of(&user);
    let pending_reports = state.repo.pending_report_count(&user).await;
    let unread_messages = state.repo.unread_message_count(&user).await;
    success(
        Me {
            user,
            permissions,
            pending_reports,
            unread_messages,
        },
        revision_id,
    )
}

/// GET /api/bookmarks - The caller's bookmarked topics.
pub async fn list_bookmarks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<TopicSummary>> {
    let revision_id = state.repo.revision_id().await;
    success(state.repo.bookmarked_topics(&user).await, revision_id)
}

/// GET /api/revision - Get the current revision info.
pub async fn get_revision(State(state): State<AppState>) -> ApiResult<RevisionInfo> {
    let revision_info = state.repo.revision_info().await;
    let revision_id = revision_info.revision_id;
    success(revision_info, revision_id)
}
