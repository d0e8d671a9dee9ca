//! Submission handlers

use crate::error::AppError;
use crate::models::*;
use crate::submissions::RequestContext;
use crate::workflow::Actor;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{get_client_ip, get_user_agent, rejected, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub form_id: Option<Uuid>,
    pub status: Option<SubmissionStatus>,
    pub member_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFilterQuery {
    pub form_id: Option<Uuid>,
    pub status: Option<SubmissionStatus>,
    pub member_id: Option<String>,
}

impl From<SubmissionFilterQuery> for SubmissionFilter {
    fn from(query: SubmissionFilterQuery) -> Self {
        SubmissionFilter {
            form_id: query.form_id,
            status: query.status,
            member_computer_id: query
                .member_id
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
        }
    }
}

fn context(actor: Actor, headers: &HeaderMap) -> RequestContext {
    RequestContext {
        actor,
        ip_address: get_client_ip(headers),
        user_agent: get_user_agent(headers),
    }
}

/// Submit a form
pub async fn create_submission(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    input: Result<Json<CreateSubmission>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = input.map_err(|e| rejected("body", e))?;
    let submission = state
        .submissions
        .create_submission(&input, &context(actor, &headers))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(submission).with_message("Submission received")),
    ))
}

/// List submissions (admin)
pub async fn list_submissions(
    State(state): State<AppState>,
    query: Result<Query<SubmissionListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| rejected("query", e))?;
    let page = state.page(query.page, query.limit)?;
    let filter = SubmissionFilter::from(SubmissionFilterQuery {
        form_id: query.form_id,
        status: query.status,
        member_id: query.member_id,
    });

    let (submissions, total) = state.submissions.list_submissions(&filter, page).await?;
    Ok(Json(ApiResponse::paginated(
        submissions,
        Pagination::new(page, total),
    )))
}

pub async fn get_submission(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(|e| rejected("submissionId", e))?;
    let submission = state.submissions.get_submission(id, &actor).await?;
    Ok(Json(ApiResponse::success(submission)))
}

pub async fn update_submission(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
    input: Result<Json<UpdateSubmission>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(|e| rejected("submissionId", e))?;
    let Json(input) = input.map_err(|e| rejected("body", e))?;
    let submission = state
        .submissions
        .update_submission(id, &input, &context(actor, &headers))
        .await?;

    Ok(Json(
        ApiResponse::success(submission).with_message("Submission updated"),
    ))
}

pub async fn delete_submission(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(|e| rejected("submissionId", e))?;
    state
        .submissions
        .soft_delete_submission(id, &context(actor, &headers))
        .await?;

    Ok(Json(
        ApiResponse::success(serde_json::json!({ "id": id })).with_message("Submission deleted"),
    ))
}

/// Export matching submissions as CSV (admin)
pub async fn export_submissions(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    query: Result<Query<SubmissionFilterQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| rejected("query", e))?;
    let table = state.submissions.export(&query.into()).await?;

    tracing::info!(
        "Admin {} exported {} submission(s) as CSV",
        admin.username,
        table.rows.len()
    );

    let filename = format!("submissions-{}.csv", Utc::now().format("%Y%m%d-%H%M%S"));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        table.to_csv(),
    ))
}

/// Submission counts by status (admin)
pub async fn submission_stats(
    State(state): State<AppState>,
    query: Result<Query<SubmissionFilterQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| rejected("query", e))?;
    let stats = state.submissions.stats(&query.into()).await?;
    Ok(Json(ApiResponse::success(stats)))
}
