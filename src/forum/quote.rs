//! Quote snapshots.
//!
//! A quote copies the source reply at capture time. There is no live link
//! back, so edits or deletion of the source never change existing quotes.

use crate::errors::{AppError, Result};
use crate::models::{QuoteSnapshot, Reply};

/// Default excerpt length in characters.
pub const DEFAULT_EXCERPT_CHARS: usize = 500;

const ELLIPSIS: char = '…';

/// Cuts `body` to at most `max_chars` characters, marking the cut.
pub fn excerpt(body: &str, max_chars: usize) -> String {
    let body = body.trim();
    match body.char_indices().nth(max_chars) {
        None => body.to_string(),
        Some((cut, _)) => {
            let mut out = body[..cut].trim_end().to_string();
            out.push(ELLIPSIS);
            out
        }
    }
}

impl QuoteSnapshot {
    pub fn capture(reply: &Reply, max_chars: usize) -> Result<Self> {
        if reply.deleted {
            return Err(AppError::Validation(format!(
                "Reply {} was deleted and cannot be quoted",
                reply.id
            )));
        }
        Ok(Self {
            id: reply.id.clone(),
            author: reply.author.display_name.clone(),
            excerpt: excerpt(&reply.body, max_chars),
        })
    }
}
