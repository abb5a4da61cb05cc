//! Vote API endpoint.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::auth::CurrentUser;
use crate::forum::VoteOutcome;
use crate::models::SubmitVoteRequest;
use crate::AppState;

/// POST /api/votes/:contentId - Vote on a topic or reply.
pub async fn submit_vote(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<SubmitVoteRequest>,
) -> ApiResult<VoteOutcome> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.vote(&user, &content_id, request).await {
        Ok(outcome) => success(outcome, state.repo.revision_id().await),
        Err(e) => error(e, revision_id),
    }
}
