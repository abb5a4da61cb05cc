//! Moderation side-state: action effects and the report queue.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{AuthorRef, CreateReportRequest, Report, ReportResolution, ReportStatus};

/// What the store must do after an aggregate applied an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationEffect {
    Applied,
    /// The topic moved away from `from`.
    Moved { from: String },
    /// The whole aggregate must be dropped.
    TopicRemoved,
}

/// Pending and resolved reports, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ReportQueue {
    reports: HashMap<String, Report>,
    order: Vec<String>,
}

impl ReportQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(
        &mut self,
        request: CreateReportRequest,
        topic_id: String,
        reporter: AuthorRef,
        at: DateTime<Utc>,
    ) -> Report {
        let report = Report {
            id: Uuid::new_v4().to_string(),
            content_type: request.content_type,
            content_id: request.content_id,
            topic_id,
            reporter,
            reason: request.reason,
            details: request.details.map(|d| d.trim().to_string()),
            status: ReportStatus::Pending,
            resolution: None,
            created_at: at,
            resolved_at: None,
        };
        self.order.push(report.id.clone());
        self.reports.insert(report.id.clone(), report.clone());
        report
    }

    pub fn list(&self, status: Option<ReportStatus>) -> Vec<Report> {
        self.order
            .iter()
            .filter_map(|id| self.reports.get(id))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.reports
            .values()
            .filter(|r| r.status == ReportStatus::Pending)
            .count()
    }

    /// Marks a report resolved. Resolving twice is a conflict.
    pub fn resolve(&mut self, id: &str, resolution: ReportResolution, at: DateTime<Utc>) -> Result<Report> {
        let report = self
            .reports
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Report", id))?;
        if report.status == ReportStatus::Resolved {
            return Err(AppError::Conflict(format!("Report {} is already resolved", id)));
        }
        report.status = ReportStatus::Resolved;
        report.resolution = Some(resolution);
        report.resolved_at = Some(at);
        Ok(report.clone())
    }

    /// Drops reports against a removed topic and its replies.
    pub fn forget_topic(&mut self, topic_id: &str) {
        self.reports.retain(|_, r| r.topic_id != topic_id);
        let reports = &self.reports;
        self.order.retain(|id| reports.contains_key(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, ReportReason};

    fn reporter() -> AuthorRef {
        AuthorRef {
            id: "1".to_string(),
            username: "sarah-johnson".to_string(),
            display_name: "Sarah Johnson".to_string(),
        }
    }

    fn request(content_id: &str) -> CreateReportRequest {
        CreateReportRequest {
            content_type: ContentType::Reply,
            content_id: content_id.to_string(),
            reason: ReportReason::Spam,
            details: Some("  buy now  ".to_string()),
        }
    }

    #[test]
    fn test_submit_and_list() {
        let mut queue = ReportQueue::new();
        let first = queue.submit(request("r1"), "t1".to_string(), reporter(), Utc::now());
        queue.submit(request("r2"), "t1".to_string(), reporter(), Utc::now());

        assert_eq!(first.details.as_deref(), Some("buy now"));
        let all = queue.list(None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content_id, "r1");
        assert_eq!(queue.pending_count(), 2);
    }

    #[test]
    fn test_resolve_twice_conflicts() {
        let mut queue = ReportQueue::new();
        let report = queue.submit(request("r1"), "t1".to_string(), reporter(), Utc::now());

        let resolved = queue
            .resolve(&report.id, ReportResolution::Dismiss, Utc::now())
            .unwrap();
        assert_eq!(resolved.status, ReportStatus::Resolved);
        assert_eq!(resolved.resolution, Some(ReportResolution::Dismiss));
        assert!(queue.list(Some(ReportStatus::Pending)).is_empty());

        assert!(matches!(
            queue.resolve(&report.id, ReportResolution::Hide, Utc::now()),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            queue.resolve("missing", ReportResolution::Hide, Utc::now()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_forget_topic() {
        let mut queue = ReportQueue::new();
        queue.submit(request("r1"), "t1".to_string(), reporter(), Utc::now());
        queue.submit(request("r9"), "t2".to_string(), reporter(), Utc::now());
        queue.forget_topic("t1");
        let left = queue.list(None);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].topic_id, "t2");
    }
}
