//! Category API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{error, reindex, success, ApiResult};
use crate::auth::{CurrentUser, MaybeUser};
use crate::models::{CategorySummary, CreateTopicRequest, Page, PageQuery, Topic, TopicSummary};
use crate::AppState;

/// GET /api/categories - List categories with topic and post counts.
pub async fn list_categories(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
) -> ApiResult<Vec<CategorySummary>> {
    let revision_id = state.repo.revision_id().await;
    success(state.repo.list_categories(viewer.as_ref()).await, revision_id)
}

/// GET /api/categories/:id/topics - List topics, pinned first.
pub async fn list_category_topics(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    Query(query): Query<PageQuery>,
    MaybeUser(viewer): MaybeUser,
) -> ApiResult<Page<TopicSummary>> {
    let revision_id = state.repo.revision_id().await;

    match state
        .repo
        .list_topics(&category_id, viewer.as_ref(), &query)
        .await
    {
        Ok(page) => success(page, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/categories/:id/topics - Start a new topic.
pub async fn create_topic(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateTopicRequest>,
) -> ApiResult<Topic> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.create_topic(&user, &category_id, request).await {
        Ok(topic) => {
            reindex(&state, &topic.id).await;
            success(topic, state.repo.revision_id().await)
        }
        Err(e) => error(e, revision_id),
    }
}
