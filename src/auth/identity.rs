//! Acting member, resolved from the `x-user-id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::errors::{AppError, AppErrorWithRevision};
use crate::models::User;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The signed-in member, or `None` for anonymous readers.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

/// A signed-in member. Anonymous requests are rejected.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppErrorWithRevision;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(MaybeUser(None));
        };

        let reject = |message: String| async move {
            AppErrorWithRevision {
                error: AppError::Unauthorized(message),
                revision_id: state.repo.revision_id().await,
            }
        };

        let Ok(id) = value.to_str().map(str::trim) else {
            return Err(reject("Malformed user id header".to_string()).await);
        };
        match state.repo.user(id).await {
            Some(user) => Ok(MaybeUser(Some(user))),
            None => Err(reject(format!("Unknown user {}", id)).await),
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppErrorWithRevision;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(user)) => Ok(CurrentUser(user)),
            MaybeUser(None) => Err(AppErrorWithRevision {
                error: AppError::Unauthorized("Sign in required".to_string()),
                revision_id: state.repo.revision_id().await,
            }),
        }
    }
}
