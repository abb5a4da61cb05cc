//! Report API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{error, reindex, success, ApiResult};
use crate::auth::CurrentUser;
use crate::models::{
    CreateReportRequest, Report, ReportQuery, ReportResolution, ResolveReportRequest,
};
use crate::AppState;

/// POST /api/reports - Report a topic or reply.
pub async fn submit_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateReportRequest>,
) -> ApiResult<Report> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.submit_report(&user, request).await {
        Ok(report) => success(report, state.repo.revision_id().await),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/reports - Moderation queue, optionally filtered by status.
pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<Report>> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.list_reports(&user, query.status).await {
        Ok(reports) => success(reports, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/reports/:id/resolve - Approve, dismiss or hide.
pub async fn resolve_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ResolveReportRequest>,
) -> ApiResult<Report> {
    let revision_id = state.repo.revision_id().await;

    match state.repo.resolve_report(&user, &id, request.resolution).await {
        Ok(report) => {
            if request.resolution == ReportResolution::Hide {
                reindex(&state, &report.topic_id).await;
            }
            success(report, state.repo.revision_id().await)
        }
        Err(e) => error(e, revision_id),
    }
}
