//! In-memory [`FormRepository`] used by the store tests

use super::FormRepository;
use crate::models::{
    AuditFilter, FieldValueInput, FieldValueRow, Form, FormAuditLog, FormChanges, FormFieldRow,
    FormFieldValue, FormFilter, FormSubmission, FormSummary, NewAuditEntry, NewForm, NewFormField,
    NewSubmission, PageRequest, SubmissionChanges, SubmissionFilter, SubmissionStatus,
};
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    forms: Vec<Form>,
    fields: Vec<FormFieldRow>,
    submissions: Vec<FormSubmission>,
    values: Vec<FormFieldValue>,
    audit: Vec<FormAuditLog>,
    /// Audit inserts still to be refused.
    failing_audit_inserts: u32,
    audit_insert_attempts: u32,
    /// Monotonic tick so rows created back to back still order strictly.
    tick: i64,
}

impl State {
    fn now(&mut self) -> chrono::DateTime<Utc> {
        self.tick += 1;
        Utc::now() + Duration::microseconds(self.tick)
    }

    fn insert_fields(&mut self, form_id: Uuid, fields: Vec<NewFormField>) -> Vec<FormFieldRow> {
        let mut rows = Vec::with_capacity(fields.len());
        for field in fields {
            let row = FormFieldRow {
                id: Uuid::new_v4(),
                form_id,
                field_name: field.field_name,
                field_label: field.field_label,
                field_type: field.field_type,
                field_order: field.field_order,
                is_required: field.is_required,
                is_hidden: field.is_hidden,
                placeholder: field.placeholder,
                help_text: field.help_text,
                default_value: field.default_value,
                column_width: field.column_width,
                options: field.options,
                validation_rule: field.validation_rule,
                created_at: self.now(),
            };
            self.fields.push(row.clone());
            rows.push(row);
        }
        rows.sort_by_key(|f| f.field_order);
        rows
    }

    fn deactivate_siblings(&mut self, form_id: Uuid) {
        let Some(form) = self.forms.iter().find(|f| f.id == form_id).cloned() else {
            return;
        };
        if !form.is_active {
            return;
        }
        let now = self.now();
        for other in self.forms.iter_mut() {
            if other.form_type == form.form_type && other.id != form.id && other.is_active {
                other.is_active = false;
                other.updated_at = now;
            }
        }
    }

    fn upsert_values(&mut self, submission_id: Uuid, values: Vec<FieldValueInput>) {
        for input in values {
            let now = self.now();
            match self
                .values
                .iter_mut()
                .find(|v| v.submission_id == submission_id && v.field_id == input.field_id)
            {
                Some(existing) => {
                    existing.value = input.value;
                    existing.updated_at = now;
                }
                None => self.values.push(FormFieldValue {
                    id: Uuid::new_v4(),
                    submission_id,
                    field_id: input.field_id,
                    value: input.value,
                    updated_at: now,
                }),
            }
        }
    }

    fn matching(&self, filter: &SubmissionFilter) -> Vec<FormSubmission> {
        let mut rows: Vec<FormSubmission> = self
            .submissions
            .iter()
            .filter(|s| !s.is_deleted)
            .filter(|s| filter.form_id.map_or(true, |id| s.form_id == id))
            .filter(|s| filter.status.map_or(true, |st| s.status == st))
            .filter(|s| {
                filter
                    .member_computer_id
                    .as_ref()
                    .map_or(true, |m| s.member_computer_id.as_ref() == Some(m))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.submission_date.cmp(&a.submission_date));
        rows
    }
}

fn paged<T: Clone>(rows: &[T], page: PageRequest) -> Vec<T> {
    rows.iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .cloned()
        .collect()
}

#[derive(Clone, Default)]
pub struct MemoryFormRepository {
    state: Arc<Mutex<State>>,
}

impl MemoryFormRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored value rows for one `(submission, field)` pair.
    pub async fn value_rows(&self, submission_id: Uuid, field_id: Uuid) -> usize {
        let state = self.state.lock().await;
        state
            .values
            .iter()
            .filter(|v| v.submission_id == submission_id && v.field_id == field_id)
            .count()
    }

    /// Raw row lookup that ignores the soft-delete flag.
    pub async fn raw_submission(&self, id: Uuid) -> Option<FormSubmission> {
        let state = self.state.lock().await;
        state.submissions.iter().find(|s| s.id == id).cloned()
    }

    pub async fn audit_entries(&self) -> Vec<FormAuditLog> {
        self.state.lock().await.audit.clone()
    }

    /// Make the next `count` audit inserts fail.
    pub async fn fail_audit_inserts(&self, count: u32) {
        self.state.lock().await.failing_audit_inserts = count;
    }

    /// Audit inserts tried so far, failed ones included.
    pub async fn audit_insert_attempts(&self) -> u32 {
        self.state.lock().await.audit_insert_attempts
    }
}

impl FormRepository for MemoryFormRepository {
    async fn insert_form(
        &self,
        form: NewForm,
        fields: Vec<NewFormField>,
    ) -> Result<(Form, Vec<FormFieldRow>), sqlx::Error> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let created = Form {
            id: Uuid::new_v4(),
            name: form.name,
            description: form.description,
            form_type: form.form_type,
            version: form.version,
            is_active: form.is_active,
            document_name: form.document_name,
            document_url: form.document_url,
            created_at: now,
            updated_at: now,
        };
        state.forms.push(created.clone());
        let rows = state.insert_fields(created.id, fields);
        state.deactivate_siblings(created.id);
        Ok((created, rows))
    }

    async fn find_form(&self, id: Uuid) -> Result<Option<Form>, sqlx::Error> {
        let state = self.state.lock().await;
        Ok(state.forms.iter().find(|f| f.id == id).cloned())
    }

    async fn find_active_form_by_type(&self, form_type: &str) -> Result<Option<Form>, sqlx::Error> {
        let state = self.state.lock().await;
        Ok(state
            .forms
            .iter()
            .filter(|f| f.form_type == form_type && f.is_active)
            .max_by_key(|f| f.updated_at)
            .cloned())
    }

    async fn list_forms(
        &self,
        filter: &FormFilter,
        page: PageRequest,
    ) -> Result<(Vec<FormSummary>, i64), sqlx::Error> {
        let state = self.state.lock().await;
        let mut forms: Vec<FormSummary> = state
            .forms
            .iter()
            .filter(|f| filter.form_type.as_ref().map_or(true, |t| &f.form_type == t))
            .filter(|f| filter.is_active.map_or(true, |a| f.is_active == a))
            .map(|f| FormSummary {
                form: f.clone(),
                field_count: state.fields.iter().filter(|ff| ff.form_id == f.id).count() as i64,
                submission_count: state
                    .submissions
                    .iter()
                    .filter(|s| s.form_id == f.id && !s.is_deleted)
                    .count() as i64,
            })
            .collect();
        forms.sort_by(|a, b| b.form.created_at.cmp(&a.form.created_at));
        let total = forms.len() as i64;
        Ok((paged(&forms, page), total))
    }

    async fn fields_for_form(&self, form_id: Uuid) -> Result<Vec<FormFieldRow>, sqlx::Error> {
        let state = self.state.lock().await;
        let mut rows: Vec<FormFieldRow> = state
            .fields
            .iter()
            .filter(|f| f.form_id == form_id)
            .cloned()
            .collect();
        rows.sort_by_key(|f| f.field_order);
        Ok(rows)
    }

    async fn update_form(
        &self,
        id: Uuid,
        changes: FormChanges,
        fields: Option<Vec<NewFormField>>,
    ) -> Result<Option<Form>, sqlx::Error> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let Some(form) = state.forms.iter_mut().find(|f| f.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            form.name = name;
        }
        if let Some(description) = changes.description {
            form.description = Some(description);
        }
        if let Some(form_type) = changes.form_type {
            form.form_type = form_type;
        }
        if let Some(is_active) = changes.is_active {
            form.is_active = is_active;
        }
        if let Some(document_name) = changes.document_name {
            form.document_name = document_name;
        }
        if let Some(document_url) = changes.document_url {
            form.document_url = document_url;
        }
        form.version += 1;
        form.updated_at = now;
        let updated = form.clone();

        if let Some(fields) = fields {
            let old: Vec<(Uuid, String)> = state
                .fields
                .iter()
                .filter(|f| f.form_id == id)
                .map(|f| (f.id, f.field_name.clone()))
                .collect();
            let new_rows = state.insert_fields(id, fields);
            for value in state.values.iter_mut() {
                let Some((_, name)) = old.iter().find(|(old_id, _)| *old_id == value.field_id)
                else {
                    continue;
                };
                if let Some(replacement) = new_rows.iter().find(|n| &n.field_name == name) {
                    value.field_id = replacement.id;
                }
            }
            state
                .fields
                .retain(|f| !old.iter().any(|(old_id, _)| *old_id == f.id));
        }

        state.deactivate_siblings(id);
        Ok(Some(updated))
    }

    async fn count_submissions(&self, form_id: Uuid) -> Result<i64, sqlx::Error> {
        let state = self.state.lock().await;
        Ok(state
            .submissions
            .iter()
            .filter(|s| s.form_id == form_id)
            .count() as i64)
    }

    async fn deactivate_form(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut state = self.state.lock().await;
        let now = state.now();
        match state.forms.iter_mut().find(|f| f.id == id) {
            Some(form) => {
                form.is_active = false;
                form.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_form(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut state = self.state.lock().await;
        if state.submissions.iter().any(|s| s.form_id == id) {
            return Err(sqlx::Error::Protocol(format!(
                "form {} is still referenced by submissions",
                id
            )));
        }
        let before = state.forms.len();
        state.forms.retain(|f| f.id != id);
        state.fields.retain(|f| f.form_id != id);
        Ok(state.forms.len() < before)
    }

    async fn insert_submission(
        &self,
        submission: NewSubmission,
        values: Vec<FieldValueInput>,
    ) -> Result<Option<FormSubmission>, sqlx::Error> {
        let mut state = self.state.lock().await;
        let current = state
            .forms
            .iter()
            .find(|f| f.id == submission.form_id)
            .map(|f| f.version);
        if current != Some(submission.form_version) {
            return Ok(None);
        }
        let now = state.now();
        let created = FormSubmission {
            id: Uuid::new_v4(),
            form_id: submission.form_id,
            status: submission.status,
            member_computer_id: submission.member_computer_id,
            submitted_by: submission.submitted_by,
            submission_date: now,
            ip_address: submission.ip_address,
            user_agent: submission.user_agent,
            notes: submission.notes,
            approved_by: None,
            approved_date: None,
            is_deleted: false,
            updated_at: now,
        };
        state.submissions.push(created.clone());
        state.upsert_values(created.id, values);
        Ok(Some(created))
    }

    async fn find_submission(&self, id: Uuid) -> Result<Option<FormSubmission>, sqlx::Error> {
        let state = self.state.lock().await;
        Ok(state
            .submissions
            .iter()
            .find(|s| s.id == id && !s.is_deleted)
            .cloned())
    }

    async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> Result<(Vec<FormSubmission>, i64), sqlx::Error> {
        let state = self.state.lock().await;
        let rows = state.matching(filter);
        let total = rows.len() as i64;
        Ok((paged(&rows, page), total))
    }

    async fn all_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> Result<Vec<FormSubmission>, sqlx::Error> {
        let state = self.state.lock().await;
        Ok(state.matching(filter))
    }

    async fn field_values(&self, submission_ids: &[Uuid]) -> Result<Vec<FieldValueRow>, sqlx::Error> {
        let state = self.state.lock().await;
        let mut rows: Vec<FieldValueRow> = state
            .values
            .iter()
            .filter(|v| submission_ids.contains(&v.submission_id))
            .filter_map(|v| {
                let field = state.fields.iter().find(|f| f.id == v.field_id)?;
                Some(FieldValueRow {
                    submission_id: v.submission_id,
                    field_id: field.id,
                    field_name: field.field_name.clone(),
                    field_label: field.field_label.clone(),
                    field_type: field.field_type,
                    field_order: field.field_order,
                    value: v.value.clone(),
                })
            })
            .collect();
        rows.sort_by_key(|r| (r.submission_id, r.field_order));
        Ok(rows)
    }

    async fn update_submission(
        &self,
        id: Uuid,
        changes: SubmissionChanges,
        values: Vec<FieldValueInput>,
    ) -> Result<Option<FormSubmission>, sqlx::Error> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let Some(submission) = state
            .submissions
            .iter_mut()
            .find(|s| s.id == id && !s.is_deleted)
        else {
            return Ok(None);
        };
        if let Some(status) = changes.status {
            submission.status = status;
        }
        if let Some(notes) = changes.notes {
            submission.notes = Some(notes);
        }
        if let Some(approved_by) = changes.approved_by {
            submission.approved_by = Some(approved_by);
        }
        if let Some(approved_date) = changes.approved_date {
            submission.approved_date = approved_date;
        }
        submission.updated_at = now;
        let updated = submission.clone();
        state.upsert_values(id, values);
        Ok(Some(updated))
    }

    async fn soft_delete_submission(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut state = self.state.lock().await;
        match state
            .submissions
            .iter_mut()
            .find(|s| s.id == id && !s.is_deleted)
        {
            Some(submission) => {
                submission.is_deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn status_counts(
        &self,
        filter: &SubmissionFilter,
    ) -> Result<Vec<(SubmissionStatus, i64)>, sqlx::Error> {
        let state = self.state.lock().await;
        let mut counts: BTreeMap<SubmissionStatus, i64> = BTreeMap::new();
        for submission in state.matching(filter) {
            *counts.entry(submission.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn insert_audit(&self, entry: NewAuditEntry) -> Result<FormAuditLog, sqlx::Error> {
        let mut state = self.state.lock().await;
        state.audit_insert_attempts += 1;
        if state.failing_audit_inserts > 0 {
            state.failing_audit_inserts -= 1;
            return Err(sqlx::Error::PoolTimedOut);
        }
        let now = state.now();
        let log = FormAuditLog {
            id: Uuid::new_v4(),
            submission_id: entry.submission_id,
            action: entry.action,
            changed_by: entry.changed_by,
            changes: entry.changes,
            ip_address: entry.ip_address,
            created_at: now,
        };
        state.audit.push(log.clone());
        Ok(log)
    }

    async fn list_audit(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<(Vec<FormAuditLog>, i64), sqlx::Error> {
        let state = self.state.lock().await;
        let mut entries: Vec<FormAuditLog> = state
            .audit
            .iter()
            .filter(|e| filter.submission_id.map_or(true, |id| e.submission_id == Some(id)))
            .filter(|e| filter.action.map_or(true, |a| e.action == a))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = entries.len() as i64;
        Ok((paged(&entries, page), total))
    }
}
