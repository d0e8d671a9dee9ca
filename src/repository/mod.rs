//! Persistence port for the form engine
//!
//! The stores talk to storage only through [`FormRepository`]. The Postgres
//! adapter is used by the server; the in-memory adapter backs the unit tests.

#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgFormRepository;

use crate::models::{
    AuditFilter, FieldValueInput, FieldValueRow, Form, FormAuditLog, FormChanges, FormFieldRow,
    FormFilter, FormSubmission, FormSummary, NewAuditEntry, NewForm, NewFormField, NewSubmission,
    PageRequest, SubmissionChanges, SubmissionFilter, SubmissionStatus,
};
use std::future::Future;
use uuid::Uuid;

/// Storage operations over forms, submissions and the audit trail.
///
/// Methods that write more than one row are atomic.
pub trait FormRepository: Clone + Send + Sync + 'static {
    /// Insert a form and its fields. When the form is active, every other
    /// active form of the same type is deactivated in the same unit.
    fn insert_form(
        &self,
        form: NewForm,
        fields: Vec<NewFormField>,
    ) -> impl Future<Output = Result<(Form, Vec<FormFieldRow>), sqlx::Error>> + Send;

    fn find_form(&self, id: Uuid) -> impl Future<Output = Result<Option<Form>, sqlx::Error>> + Send;

    /// The active form of a type, newest first when several exist.
    fn find_active_form_by_type(
        &self,
        form_type: &str,
    ) -> impl Future<Output = Result<Option<Form>, sqlx::Error>> + Send;

    fn list_forms(
        &self,
        filter: &FormFilter,
        page: PageRequest,
    ) -> impl Future<Output = Result<(Vec<FormSummary>, i64), sqlx::Error>> + Send;

    /// Fields of a form ordered by `field_order`.
    fn fields_for_form(
        &self,
        form_id: Uuid,
    ) -> impl Future<Output = Result<Vec<FormFieldRow>, sqlx::Error>> + Send;

    /// Merge scalar changes, bump the version and, when `fields` is given,
    /// replace the field set. Stored values are re-pointed to the new field
    /// rows by field name; values of dropped fields are left orphaned.
    fn update_form(
        &self,
        id: Uuid,
        changes: FormChanges,
        fields: Option<Vec<NewFormField>>,
    ) -> impl Future<Output = Result<Option<Form>, sqlx::Error>> + Send;

    /// Every stored submission of the form, soft-deleted ones included.
    fn count_submissions(
        &self,
        form_id: Uuid,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    fn deactivate_form(&self, id: Uuid) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Hard delete; fields go with the form. Refused while submissions reference it.
    fn delete_form(&self, id: Uuid) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Insert a submission together with one value row per entry.
    ///
    /// `None` when the form is gone or no longer at `form_version`, so the
    /// values may point at replaced fields.
    fn insert_submission(
        &self,
        submission: NewSubmission,
        values: Vec<FieldValueInput>,
    ) -> impl Future<Output = Result<Option<FormSubmission>, sqlx::Error>> + Send;

    /// A submission that has not been soft-deleted.
    fn find_submission(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<FormSubmission>, sqlx::Error>> + Send;

    /// Live submissions, newest first, with the unpaged total.
    fn list_submissions(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> impl Future<Output = Result<(Vec<FormSubmission>, i64), sqlx::Error>> + Send;

    /// Every live submission matching the filter, newest first.
    fn all_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> impl Future<Output = Result<Vec<FormSubmission>, sqlx::Error>> + Send;

    /// Values joined with their fields. Values whose field no longer exists
    /// are not returned.
    fn field_values(
        &self,
        submission_ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<FieldValueRow>, sqlx::Error>> + Send;

    /// Apply row changes and upsert values by `(submission, field)`.
    fn update_submission(
        &self,
        id: Uuid,
        changes: SubmissionChanges,
        values: Vec<FieldValueInput>,
    ) -> impl Future<Output = Result<Option<FormSubmission>, sqlx::Error>> + Send;

    /// Returns `false` when the submission is missing or already deleted.
    fn soft_delete_submission(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    fn status_counts(
        &self,
        filter: &SubmissionFilter,
    ) -> impl Future<Output = Result<Vec<(SubmissionStatus, i64)>, sqlx::Error>> + Send;

    fn insert_audit(
        &self,
        entry: NewAuditEntry,
    ) -> impl Future<Output = Result<FormAuditLog, sqlx::Error>> + Send;

    /// Audit entries newest first, with the unpaged total.
    fn list_audit(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> impl Future<Output = Result<(Vec<FormAuditLog>, i64), sqlx::Error>> + Send;
}
