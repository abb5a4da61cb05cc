//! Notification API endpoints.

use axum::extract::{Path, State};
use serde::Serialize;

use super::{error, success, ApiResult};
use crate::auth::CurrentUser;
use crate::models::{Notification, NotificationFeed};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllRead {
    pub updated: usize,
}

/// GET /api/notifications - The caller's feed, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<NotificationFeed> {
    let revision_id = state.repo.revision_id().await;
    success(state.repo.notifications(&user).await, revision_id)
}

/// POST /api/notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Notification> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.mark_notification_read(&user, &id).await {
        Ok(notification) => success(notification, state.repo.revision_id().await),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/notifications/read-all
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<MarkAllRead> {
    let updated = state.repo.mark_all_notifications_read(&user).await;
    success(MarkAllRead { updated }, state.repo.revision_id().await)
}
