//! Threaded discussion state: votes, reply trees, topic aggregates and the
//! side-state kept next to them, including private messages.

pub mod aggregate;
pub mod gateway;
pub mod messages;
pub mod moderation;
pub mod notifications;
pub mod quote;
pub mod rate_limit;
pub mod read_status;
pub mod session;
pub mod tree;
pub mod vote;

pub use aggregate::{TopicAggregate, ViewContext};
pub use gateway::ForumGateway;
pub use messages::MessageCenter;
pub use moderation::{ModerationEffect, ReportQueue};
pub use notifications::{mentions, NotificationCenter};
pub use quote::{excerpt, DEFAULT_EXCERPT_CHARS};
pub use rate_limit::{ActionKind, RateDecision, RateLimiter};
pub use read_status::{Bookmarks, ReadTracker};
pub use session::DiscussionSession;
pub use tree::{ReplyTree, ThreadPolicy, DEFAULT_MAX_REPLY_DEPTH};
pub use vote::{VoteLedger, VoteOutcome, VoteState, VoteType};
