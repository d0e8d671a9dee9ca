//! Data models for the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

// =============================================================================
// Enums
// =============================================================================

/// Closed set of input kinds a form field can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "form_field_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Email,
    Number,
    Date,
    Textarea,
    Select,
    Checkbox,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "form_submission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "form_audit_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreatedDraft,
    Submitted,
    Approved,
    Rejected,
    Updated,
    Deleted,
}

// =============================================================================
// Field metadata
// =============================================================================

/// One `{value, label}` choice of a select-like field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

/// Structured constraint attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationRule {
    pub fn is_empty(&self) -> bool {
        self == &ValidationRule::default()
    }
}

// =============================================================================
// Form
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub form_type: String,
    pub version: i32,
    pub is_active: bool,
    pub document_name: String,
    pub document_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored field row; `options` and `validation_rule` hold the encoded text.
#[derive(Debug, Clone, FromRow)]
pub struct FormFieldRow {
    pub id: Uuid,
    pub form_id: Uuid,
    pub field_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub field_order: i32,
    pub is_required: bool,
    pub is_hidden: bool,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub default_value: Option<String>,
    pub column_width: Option<String>,
    pub options: Option<String>,
    pub validation_rule: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Field with its metadata decoded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: Uuid,
    pub form_id: Uuid,
    pub field_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub field_order: i32,
    pub is_required: bool,
    pub is_hidden: bool,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub default_value: Option<String>,
    pub column_width: Option<String>,
    pub options: Option<Vec<FieldOption>>,
    pub validation_rule: Option<ValidationRule>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormWithFields {
    #[serde(flatten)]
    pub form: Form,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub form: Form,
    pub field_count: i64,
    pub submission_count: i64,
}

/// Insert shape for a form row.
#[derive(Debug, Clone)]
pub struct NewForm {
    pub name: String,
    pub description: Option<String>,
    pub form_type: String,
    pub version: i32,
    pub is_active: bool,
    pub document_name: String,
    pub document_url: String,
}

/// Insert shape for a field row, metadata already encoded.
#[derive(Debug, Clone)]
pub struct NewFormField {
    pub field_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub field_order: i32,
    pub is_required: bool,
    pub is_hidden: bool,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub default_value: Option<String>,
    pub column_width: Option<String>,
    pub options: Option<String>,
    pub validation_rule: Option<String>,
}

/// Scalar changes merged into an existing form; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct FormChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub form_type: Option<String>,
    pub is_active: Option<bool>,
    pub document_name: Option<String>,
    pub document_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FieldInput {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub field_name: String,
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub field_label: String,
    pub field_type: FieldType,
    pub field_order: i32,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub placeholder: Option<String>,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub help_text: Option<String>,
    pub default_value: Option<String>,
    #[validate(length(max = 20, message = "must be at most 20 characters"))]
    pub column_width: Option<String>,
    pub options: Option<Vec<FieldOption>>,
    pub validation_rule: Option<ValidationRule>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateForm {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 64, message = "must be between 1 and 64 characters"))]
    pub form_type: String,
    pub version: Option<i32>,
    pub is_active: Option<bool>,
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub document_name: String,
    #[validate(length(min = 1, max = 2048, message = "must be between 1 and 2048 characters"))]
    pub document_url: String,
    #[serde(default)]
    pub fields: Vec<FieldInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateForm {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 64, message = "must be between 1 and 64 characters"))]
    pub form_type: Option<String>,
    pub is_active: Option<bool>,
    pub document_name: Option<String>,
    pub document_url: Option<String>,
    pub fields: Option<Vec<FieldInput>>,
}

/// Normalized form definition produced by the validator.
#[derive(Debug, Clone)]
pub struct FormDefinition {
    pub name: String,
    pub description: Option<String>,
    pub form_type: String,
    pub version: i32,
    pub is_active: bool,
    pub document_name: String,
    pub document_url: String,
    pub fields: Vec<FieldInput>,
}

/// Normalized form update produced by the validator.
#[derive(Debug, Clone, Default)]
pub struct FormPatch {
    pub changes: FormChanges,
    pub fields: Option<Vec<FieldInput>>,
}

#[derive(Debug, Clone, Default)]
pub struct FormFilter {
    pub form_type: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deactivated,
    Deleted,
}

// =============================================================================
// Submission
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub id: Uuid,
    pub form_id: Uuid,
    pub status: SubmissionStatus,
    pub member_computer_id: Option<String>,
    pub submitted_by: Option<String>,
    pub submission_date: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub notes: Option<String>,
    pub approved_by: Option<String>,
    pub approved_date: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub is_deleted: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldValue {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub field_id: Uuid,
    pub value: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A stored value joined with the field it belongs to.
#[derive(Debug, Clone, FromRow)]
pub struct FieldValueRow {
    pub submission_id: Uuid,
    pub field_id: Uuid,
    pub field_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub field_order: i32,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValueResponse {
    pub field_id: Uuid,
    pub field_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub field_order: i32,
    pub value: Option<String>,
    pub typed_value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub submission: FormSubmission,
    pub form_name: Option<String>,
    pub form_type: Option<String>,
    pub field_values: Vec<FieldValueResponse>,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub form_id: Uuid,
    /// Form version the values were validated against.
    pub form_version: i32,
    pub status: SubmissionStatus,
    pub member_computer_id: Option<String>,
    pub submitted_by: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub notes: Option<String>,
}

/// Row-level changes for a submission. `approved_date` is `Some` only when
/// the status is being written.
#[derive(Debug, Clone, Default)]
pub struct SubmissionChanges {
    pub status: Option<SubmissionStatus>,
    pub notes: Option<String>,
    pub approved_by: Option<String>,
    pub approved_date: Option<Option<DateTime<Utc>>>,
}

/// A normalized value ready to store against one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValueInput {
    pub field_id: Uuid,
    pub field_name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmission {
    pub form_id: Uuid,
    pub status: Option<SubmissionStatus>,
    pub member_computer_id: Option<String>,
    pub submitted_by: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub field_values: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubmission {
    pub status: Option<SubmissionStatus>,
    pub notes: Option<String>,
    pub approved_by: Option<String>,
    pub field_values: Option<serde_json::Map<String, serde_json::Value>>,
}

impl UpdateSubmission {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.notes.is_none()
            && self.approved_by.is_none()
            && self.field_values.as_ref().map_or(true, |v| v.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub form_id: Option<Uuid>,
    pub status: Option<SubmissionStatus>,
    pub member_computer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStats {
    pub total_submissions: i64,
    pub by_status: std::collections::BTreeMap<String, i64>,
    pub recent_submissions: Vec<FormSubmission>,
}

// =============================================================================
// Audit Log
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormAuditLog {
    pub id: Uuid,
    pub submission_id: Option<Uuid>,
    pub action: AuditAction,
    pub changed_by: String,
    pub changes: serde_json::Value,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub submission_id: Option<Uuid>,
    pub action: AuditAction,
    pub changed_by: String,
    pub changes: serde_json::Value,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub submission_id: Option<Uuid>,
    pub action: Option<AuditAction>,
}

// =============================================================================
// Admin User
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct AdminUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<AdminUser> for AdminUserResponse {
    fn from(user: AdminUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct AdminSession {
    pub id: Uuid,
    pub admin_user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let pages = if total == 0 {
            0
        } else {
            (total + request.limit - 1) / request.limit
        };
        Self {
            page: request.page,
            limit: request.limit,
            total,
            pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            pagination: None,
        }
    }

    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::success(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            message: None,
            pagination: None,
        }
    }
}
