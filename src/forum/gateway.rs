//! Boundary between a discussion session and the authoritative forum state.

use async_trait::async_trait;
use uuid::Uuid;

use super::vote::{VoteOutcome, VoteState};
use crate::errors::Result;
use crate::models::{CreateReplyRequest, Reply};

/// Accepts reply and vote submissions on behalf of one member.
///
/// Both calls must be safe to retry: votes carry the target state and a
/// request id, replies are only applied once they return `Ok`.
#[async_trait]
pub trait ForumGateway: Send + Sync {
    async fn submit_reply(
        &self,
        user_id: &str,
        topic_id: &str,
        request: CreateReplyRequest,
    ) -> Result<Reply>;

    async fn submit_vote(
        &self,
        user_id: &str,
        topic_id: &str,
        content_id: &str,
        target: VoteState,
        request_id: Uuid,
    ) -> Result<VoteOutcome>;
}
