//! Data models for the forum backend.
//!
//! Field names serialize in camelCase to match the forum front-end records.

mod category;
mod message;
mod moderation;
mod notification;
mod reply;
mod revision;
mod topic;
mod user;
mod vote;

pub use category::*;
pub use message::*;
pub use moderation::*;
pub use notification::*;
pub use reply::*;
pub use revision::*;
pub use topic::*;
pub use user::*;
pub use vote::*;
