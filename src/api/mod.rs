//! REST API module.
//!
//! Contains all API routes and handlers following the forum front-end contract.

mod account;
mod admin;
mod categories;
mod messages;
mod notifications;
mod replies;
mod reports;
mod search;
mod topics;
mod votes;

pub use account::*;
pub use admin::*;
pub use categories::*;
pub use messages::*;
pub use notifications::*;
pub use replies::*;
pub use reports::*;
pub use search::*;
pub use topics::*;
pub use votes::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: crate::errors::AppError, revision_id: i64) -> ApiResult<T> {
    Err(crate::errors::AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Bring the search index in line with a topic after a write.
///
/// A topic that no longer exists is dropped from the index.
async fn reindex(state: &AppState, topic_id: &str) {
    let result = match state.repo.search_document(topic_id).await {
        Some(document) => state.search.index_topic(&document).await,
        None => state.search.remove_topic(topic_id).await,
    };
    if let Err(e) = result {
        tracing::warn!("Failed to re-index topic {}: {}", topic_id, e);
    }
}
