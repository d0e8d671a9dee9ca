//! Audit log handlers

use crate::error::AppError;
use crate::models::*;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{rejected, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub submission_id: Option<Uuid>,
    pub action: Option<AuditAction>,
}

/// Audit entries, newest first (admin)
pub async fn list_audit_logs(
    State(state): State<AppState>,
    query: Result<Query<AuditLogQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| rejected("query", e))?;
    let page = state.page(query.page, query.limit)?;
    let filter = AuditFilter {
        submission_id: query.submission_id,
        action: query.action,
    };

    let (entries, total) = state.submissions.audit().list(&filter, page).await?;
    Ok(Json(ApiResponse::paginated(entries, Pagination::new(page, total))))
}
