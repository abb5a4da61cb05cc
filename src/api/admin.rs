//! Member management endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::auth::CurrentUser;
use crate::models::{BanRequest, ChangeRoleRequest, User, UserQuery};
use crate::AppState;

/// GET /api/admin/users?q&role&status
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<User>> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.list_users(&user, &query).await {
        Ok(users) => success(users, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/admin/users/:id/role
pub async fn change_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ChangeRoleRequest>,
) -> ApiResult<User> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.change_role(&user, &id, request.role).await {
        Ok(updated) => success(updated, state.repo.revision_id().await),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/users/:id/ban
pub async fn ban_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<BanRequest>,
) -> ApiResult<User> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.ban_user(&user, &id, request).await {
        Ok(banned) => success(banned, state.repo.revision_id().await),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/users/:id/unban
pub async fn unban_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<User> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.unban_user(&user, &id).await {
        Ok(unbanned) => success(unbanned, state.repo.revision_id().await),
        Err(e) => error(e, revision_id),
    }
}
