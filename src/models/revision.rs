//! Revision info for change detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic write counter exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: DateTime<Utc>,
}
