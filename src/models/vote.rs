//! Vote submission request.

use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::forum::{VoteState, VoteType};

/// Request body for `submitVote`.
///
/// `vote` toggles like the vote buttons do; `target` sets the final state
/// directly and is naturally idempotent. Exactly one must be present.
/// A `requestId` makes a retried toggle a no-op.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteRequest {
    #[serde(default)]
    pub vote: Option<VoteType>,
    #[serde(default)]
    pub target: Option<VoteState>,
    #[serde(default)]
    pub request_id: Option<Uuid>,
}

/// Validated form of [`SubmitVoteRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteCommand {
    Toggle(VoteType),
    Set(VoteState),
}

impl SubmitVoteRequest {
    pub fn command(&self) -> Result<VoteCommand> {
        match (self.vote, self.target) {
            (Some(vote), None) => Ok(VoteCommand::Toggle(vote)),
            (None, Some(target)) => Ok(VoteCommand::Set(target)),
            (Some(_), Some(_)) => Err(AppError::Validation(
                "Provide either vote or target, not both".to_string(),
            )),
            (None, None) => Err(AppError::Validation(
                "Either vote or target is required".to_string(),
            )),
        }
    }
}
