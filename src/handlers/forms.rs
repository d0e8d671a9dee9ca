//! Form definition handlers

use crate::error::AppError;
use crate::models::*;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{rejected, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub form_type: Option<String>,
    pub is_active: Option<bool>,
}

/// List forms with field and submission counts
pub async fn list_forms(
    State(state): State<AppState>,
    query: Result<Query<FormListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| rejected("query", e))?;
    let page = state.page(query.page, query.limit)?;
    let filter = FormFilter {
        form_type: query
            .form_type
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty()),
        is_active: query.is_active,
    };

    let (forms, total) = state.forms.list_forms(&filter, page).await?;
    Ok(Json(ApiResponse::paginated(forms, Pagination::new(page, total))))
}

pub async fn create_form(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    input: Result<Json<CreateForm>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = input.map_err(|e| rejected("body", e))?;
    let form = state.forms.create_form(&input).await?;

    tracing::info!(
        "Admin {} created form {} ({} v{})",
        admin.username,
        form.form.id,
        form.form.form_type,
        form.form.version
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(form).with_message("Form created")),
    ))
}

pub async fn get_form(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(|e| rejected("formId", e))?;
    let form = state.forms.get_form(id).await?;
    Ok(Json(ApiResponse::success(form)))
}

/// The active form for a type
pub async fn get_form_by_type(
    State(state): State<AppState>,
    Path(form_type): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let form = state.forms.get_form_by_type(&form_type).await?;
    Ok(Json(ApiResponse::success(form)))
}

pub async fn update_form(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    id: Result<Path<Uuid>, PathRejection>,
    input: Result<Json<UpdateForm>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(|e| rejected("formId", e))?;
    let Json(input) = input.map_err(|e| rejected("body", e))?;
    let form = state.forms.update_form(id, &input).await?;

    tracing::info!(
        "Admin {} updated form {} to version {}",
        admin.username,
        form.form.id,
        form.form.version
    );

    Ok(Json(ApiResponse::success(form).with_message("Form updated")))
}

pub async fn delete_form(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(|e| rejected("formId", e))?;
    let outcome = state.forms.delete_form(id).await?;

    tracing::info!("Admin {} removed form {}: {:?}", admin.username, id, outcome);

    let message = match outcome {
        DeleteOutcome::Deactivated => "Form has submissions and was deactivated",
        DeleteOutcome::Deleted => "Form deleted",
    };
    Ok(Json(
        ApiResponse::success(serde_json::json!({ "outcome": outcome })).with_message(message),
    ))
}
