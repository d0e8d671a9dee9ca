//! Submission store
//!
//! Creates, reads, edits and soft-deletes submissions. Every mutation goes
//! through the approval workflow checks and leaves one audit entry behind.

use crate::audit::AuditLog;
use crate::codec::{decode_field, decode_value};
use crate::error::{AppError, ValidationErrors};
use crate::export::{self, ExportTable};
use crate::models::{
    AuditAction, CreateSubmission, FieldValueInput, FieldValueRow, Form, FormField,
    FormSubmission, NewAuditEntry, NewSubmission, PageRequest, SubmissionChanges,
    SubmissionDetail, SubmissionFilter, SubmissionStats, SubmissionStatus, UpdateSubmission,
};
use crate::repository::FormRepository;
use crate::validation::{validate_field_patch, validate_submission_payload};
use crate::workflow::{self, Actor};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

const RECENT_SUBMISSIONS: i64 = 5;

/// Who is acting and where the request came from.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: Actor,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            ip_address: None,
            user_agent: None,
        }
    }
}

#[derive(Clone)]
pub struct SubmissionStore<R> {
    repo: R,
    audit: AuditLog<R>,
}

impl<R: FormRepository> SubmissionStore<R> {
    pub fn new(repo: R) -> Self {
        let audit = AuditLog::new(repo.clone());
        Self { repo, audit }
    }

    pub async fn create_submission(
        &self,
        input: &CreateSubmission,
        ctx: &RequestContext,
    ) -> Result<SubmissionDetail, AppError> {
        let status = input.status.unwrap_or(SubmissionStatus::Submitted);
        workflow::authorize_create(status)?;

        let member_computer_id = non_blank(input.member_computer_id.as_deref());
        if let (Actor::Submitter { identity }, Some(member)) = (&ctx.actor, &member_computer_id) {
            if identity != "anonymous" && identity != member {
                return Err(AppError::Forbidden(
                    "Cannot submit on behalf of another member".to_string(),
                ));
            }
        }

        let form = self
            .repo
            .find_form(input.form_id)
            .await
            .map_err(AppError::storage("create submission"))?
            .ok_or_else(|| AppError::NotFound("Form not found".to_string()))?;
        if !form.is_active {
            return Err(AppError::Conflict(
                "This form is no longer accepting submissions".to_string(),
            ));
        }

        let fields = self.fields(form.id).await?;
        let values = validate_submission_payload(&input.field_values, &fields)?;

        let submitted_by = non_blank(input.submitted_by.as_deref())
            .or_else(|| member_computer_id.clone())
            .unwrap_or_else(|| ctx.actor.identity().to_string());

        let new_submission = NewSubmission {
            form_id: form.id,
            form_version: form.version,
            status,
            member_computer_id,
            submitted_by: Some(submitted_by),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            notes: non_blank(input.notes.as_deref()),
        };

        let field_names: Vec<&str> = values.iter().map(|v| v.field_name.as_str()).collect();
        let changes = json!({
            "formId": form.id,
            "status": status,
            "fields": field_names,
        });

        let submission = self
            .repo
            .insert_submission(new_submission, values)
            .await
            .map_err(AppError::storage("create submission"))?
            .ok_or_else(|| {
                AppError::Conflict(
                    "The form changed while submitting; please submit again".to_string(),
                )
            })?;

        let action = if status == SubmissionStatus::Draft {
            AuditAction::CreatedDraft
        } else {
            AuditAction::Submitted
        };
        self.audit
            .append(NewAuditEntry {
                submission_id: Some(submission.id),
                action,
                changed_by: ctx.actor.identity().to_string(),
                changes,
                ip_address: ctx.ip_address.clone(),
            })
            .await;

        tracing::info!(
            "Submission {} created for form {} as {}",
            submission.id,
            form.id,
            status.as_str()
        );
        self.detail(submission, Some(&form)).await
    }

    pub async fn get_submission(
        &self,
        id: Uuid,
        actor: &Actor,
    ) -> Result<SubmissionDetail, AppError> {
        let submission = self.load(id, "load submission").await?;
        if !workflow::can_view(actor, &submission) {
            return Err(AppError::Forbidden(
                "You do not have access to this submission".to_string(),
            ));
        }
        let form = self
            .repo
            .find_form(submission.form_id)
            .await
            .map_err(AppError::storage("load submission"))?;
        self.detail(submission, form.as_ref()).await
    }

    /// Live submissions newest first, each with its decoded values.
    pub async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> Result<(Vec<SubmissionDetail>, i64), AppError> {
        let (submissions, total) = self
            .repo
            .list_submissions(filter, page)
            .await
            .map_err(AppError::storage("list submissions"))?;

        let ids: Vec<Uuid> = submissions.iter().map(|s| s.id).collect();
        let mut values = group_values(
            self.repo
                .field_values(&ids)
                .await
                .map_err(AppError::storage("list submissions"))?,
        );

        let mut forms: HashMap<Uuid, Option<Form>> = HashMap::new();
        for submission in &submissions {
            if !forms.contains_key(&submission.form_id) {
                let form = self
                    .repo
                    .find_form(submission.form_id)
                    .await
                    .map_err(AppError::storage("list submissions"))?;
                forms.insert(submission.form_id, form);
            }
        }

        let details = submissions
            .into_iter()
            .map(|submission| {
                let rows = values.remove(&submission.id).unwrap_or_default();
                let form = forms.get(&submission.form_id).and_then(Option::as_ref);
                assemble(submission, form, rows)
            })
            .collect();

        Ok((details, total))
    }

    /// Apply a patch and record exactly one audit entry for it.
    pub async fn update_submission(
        &self,
        id: Uuid,
        patch: &UpdateSubmission,
        ctx: &RequestContext,
    ) -> Result<SubmissionDetail, AppError> {
        if patch.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.add(
                "body",
                "at least one of status, notes, approvedBy or fieldValues is required",
            );
            return Err(errors.into());
        }

        let current = self.load(id, "update submission").await?;
        workflow::authorize_update(&ctx.actor, &current, patch)?;

        let edits = match patch.field_values.as_ref().filter(|v| !v.is_empty()) {
            Some(values) => {
                let fields = self.fields(current.form_id).await?;
                validate_field_patch(values, &fields)?
            }
            None => Vec::new(),
        };

        let approved_by = match (patch.status, &patch.approved_by) {
            (_, Some(name)) => non_blank(Some(name.as_str())),
            (Some(SubmissionStatus::Approved), None) if ctx.actor.is_admin() => {
                Some(ctx.actor.identity().to_string())
            }
            _ => None,
        };
        let changes = SubmissionChanges {
            status: patch.status,
            notes: patch.notes.clone(),
            approved_by: approved_by.clone(),
            approved_date: patch.status.map(|status| match status {
                SubmissionStatus::Approved => Some(Utc::now()),
                _ => None,
            }),
        };

        let summary = change_summary(&current, patch, approved_by.as_deref(), &edits);
        let action = workflow::audit_action_for(current.status, patch.status);

        let updated = self
            .repo
            .update_submission(id, changes, edits)
            .await
            .map_err(AppError::storage("update submission"))?
            .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

        self.audit
            .append(NewAuditEntry {
                submission_id: Some(updated.id),
                action,
                changed_by: ctx.actor.identity().to_string(),
                changes: summary,
                ip_address: ctx.ip_address.clone(),
            })
            .await;

        let form = self
            .repo
            .find_form(updated.form_id)
            .await
            .map_err(AppError::storage("update submission"))?;
        self.detail(updated, form.as_ref()).await
    }

    pub async fn soft_delete_submission(
        &self,
        id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), AppError> {
        workflow::authorize_delete(&ctx.actor)?;

        let deleted = self
            .repo
            .soft_delete_submission(id)
            .await
            .map_err(AppError::storage("delete submission"))?;
        if !deleted {
            return Err(AppError::NotFound("Submission not found".to_string()));
        }

        self.audit
            .append(NewAuditEntry {
                submission_id: Some(id),
                action: AuditAction::Deleted,
                changed_by: ctx.actor.identity().to_string(),
                changes: json!({ "isDeleted": true }),
                ip_address: ctx.ip_address.clone(),
            })
            .await;

        tracing::info!("Submission {} deleted by {}", id, ctx.actor.identity());
        Ok(())
    }

    pub async fn stats(&self, filter: &SubmissionFilter) -> Result<SubmissionStats, AppError> {
        let counts = self
            .repo
            .status_counts(filter)
            .await
            .map_err(AppError::storage("load submission statistics"))?;

        let by_status: BTreeMap<String, i64> = counts
            .iter()
            .map(|(status, count)| (status.as_str().to_string(), *count))
            .collect();
        let total_submissions = counts.iter().map(|(_, count)| count).sum();

        let recent = PageRequest {
            page: 1,
            limit: RECENT_SUBMISSIONS,
        };
        let (recent_submissions, _) = self
            .repo
            .list_submissions(filter, recent)
            .await
            .map_err(AppError::storage("load submission statistics"))?;

        Ok(SubmissionStats {
            total_submissions,
            by_status,
            recent_submissions,
        })
    }

    pub async fn export(&self, filter: &SubmissionFilter) -> Result<ExportTable, AppError> {
        export::export_submissions(&self.repo, filter).await
    }

    pub fn audit(&self) -> &AuditLog<R> {
        &self.audit
    }

    async fn load(&self, id: Uuid, operation: &'static str) -> Result<FormSubmission, AppError> {
        self.repo
            .find_submission(id)
            .await
            .map_err(AppError::storage(operation))?
            .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))
    }

    async fn fields(&self, form_id: Uuid) -> Result<Vec<FormField>, AppError> {
        let rows = self
            .repo
            .fields_for_form(form_id)
            .await
            .map_err(AppError::storage("load form fields"))?;
        Ok(rows.into_iter().map(decode_field).collect())
    }

    async fn detail(
        &self,
        submission: FormSubmission,
        form: Option<&Form>,
    ) -> Result<SubmissionDetail, AppError> {
        let rows = self
            .repo
            .field_values(&[submission.id])
            .await
            .map_err(AppError::storage("load submission"))?;
        Ok(assemble(submission, form, rows))
    }
}

fn assemble(
    submission: FormSubmission,
    form: Option<&Form>,
    mut rows: Vec<FieldValueRow>,
) -> SubmissionDetail {
    rows.sort_by_key(|r| r.field_order);
    SubmissionDetail {
        submission,
        form_name: form.map(|f| f.name.clone()),
        form_type: form.map(|f| f.form_type.clone()),
        field_values: rows.into_iter().map(decode_value).collect(),
    }
}

fn group_values(rows: Vec<FieldValueRow>) -> HashMap<Uuid, Vec<FieldValueRow>> {
    let mut grouped: HashMap<Uuid, Vec<FieldValueRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.submission_id).or_default().push(row);
    }
    grouped
}

fn change_summary(
    current: &FormSubmission,
    patch: &UpdateSubmission,
    approved_by: Option<&str>,
    edits: &[FieldValueInput],
) -> Value {
    let mut summary = Map::new();
    if let Some(status) = patch.status {
        summary.insert(
            "status".to_string(),
            json!({ "from": current.status, "to": status }),
        );
    }
    if let Some(notes) = &patch.notes {
        summary.insert("notes".to_string(), json!(notes));
    }
    if let Some(approved_by) = approved_by {
        summary.insert("approvedBy".to_string(), json!(approved_by));
    }
    if !edits.is_empty() {
        let names: Vec<&str> = edits.iter().map(|e| e.field_name.as_str()).collect();
        summary.insert("fields".to_string(), json!(names));
    }
    Value::Object(summary)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::APPEND_ATTEMPTS;
    use crate::forms::tests::{field, zakat_form};
    use crate::forms::FormStore;
    use crate::models::{DeleteOutcome, FieldType, FormWithFields, UpdateForm};
    use crate::repository::memory::MemoryFormRepository;
    use tokio_test::{assert_err, assert_ok};

    struct Harness {
        repo: MemoryFormRepository,
        forms: FormStore<MemoryFormRepository>,
        store: SubmissionStore<MemoryFormRepository>,
        form: FormWithFields,
    }

    async fn harness() -> Harness {
        let repo = MemoryFormRepository::new();
        let forms = FormStore::new(repo.clone());
        let store = SubmissionStore::new(repo.clone());
        let form = forms.create_form(&zakat_form()).await.unwrap();
        Harness {
            repo,
            forms,
            store,
            form,
        }
    }

    fn admin() -> RequestContext {
        RequestContext::new(Actor::Admin {
            username: "admin1".to_string(),
        })
    }

    fn anonymous() -> RequestContext {
        RequestContext::new(Actor::anonymous())
    }

    fn payload(form_id: Uuid, values: Value) -> CreateSubmission {
        CreateSubmission {
            form_id,
            status: None,
            member_computer_id: None,
            submitted_by: None,
            notes: None,
            field_values: values.as_object().cloned().unwrap_or_default(),
        }
    }

    fn field_values(values: Value) -> UpdateSubmission {
        UpdateSubmission {
            field_values: values.as_object().cloned(),
            ..Default::default()
        }
    }

    fn value_of<'a>(detail: &'a SubmissionDetail, name: &str) -> Option<&'a str> {
        detail
            .field_values
            .iter()
            .find(|v| v.field_name == name)
            .and_then(|v| v.value.as_deref())
    }

    #[tokio::test]
    async fn test_create_writes_one_value_per_declared_field() {
        let h = harness().await;
        let input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));

        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);
        assert_eq!(created.submission.status, SubmissionStatus::Submitted);
        assert_eq!(created.field_values.len(), 2);
        assert_eq!(value_of(&created, "applicantName"), Some("Ali"));
        assert_eq!(value_of(&created, "loanAmount"), None);
        assert_eq!(created.form_type.as_deref(), Some("zakat"));

        let fetched = assert_ok!(
            h.store
                .get_submission(created.submission.id, &Actor::anonymous())
                .await
        );
        assert_eq!(fetched.field_values.len(), 2);
    }

    #[tokio::test]
    async fn test_create_missing_required_field_names_it() {
        let h = harness().await;
        let input = payload(h.form.form.id, json!({ "loanAmount": 500 }));

        let err = assert_err!(h.store.create_submission(&input, &anonymous()).await);
        match err {
            AppError::Validation(errors) => assert!(errors.contains("applicantName")),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(h.repo.audit_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_against_missing_form_is_not_found() {
        let h = harness().await;
        let input = payload(Uuid::new_v4(), json!({ "applicantName": "Ali" }));
        assert!(matches!(
            h.store.create_submission(&input, &anonymous()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_records_metadata_and_audit() {
        let h = harness().await;
        let mut input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        input.status = Some(SubmissionStatus::Draft);
        input.member_computer_id = Some("M-100".to_string());
        let ctx = RequestContext {
            actor: Actor::Submitter {
                identity: "M-100".to_string(),
            },
            ip_address: Some("10.0.0.7".to_string()),
            user_agent: Some("test-agent".to_string()),
        };

        let created = assert_ok!(h.store.create_submission(&input, &ctx).await);
        assert_eq!(created.submission.submitted_by.as_deref(), Some("M-100"));
        assert_eq!(created.submission.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(created.submission.user_agent.as_deref(), Some("test-agent"));

        let audit = h.repo.audit_entries().await;
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, AuditAction::CreatedDraft);
        assert_eq!(audit[0].submission_id, Some(created.submission.id));
    }

    #[tokio::test]
    async fn test_create_rejects_inactive_form() {
        let h = harness().await;
        let update = UpdateForm {
            is_active: Some(false),
            ..Default::default()
        };
        assert_ok!(h.forms.update_form(h.form.form.id, &update).await);

        let input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        assert!(matches!(
            h.store.create_submission(&input, &anonymous()).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_approve_then_reject_clears_approved_date() {
        let h = harness().await;
        let input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);
        let id = created.submission.id;

        let approve = UpdateSubmission {
            status: Some(SubmissionStatus::Approved),
            approved_by: Some("admin1".to_string()),
            ..Default::default()
        };
        let approved = assert_ok!(h.store.update_submission(id, &approve, &admin()).await);
        assert!(approved.submission.approved_date.is_some());
        assert_eq!(approved.submission.approved_by.as_deref(), Some("admin1"));

        let reject = UpdateSubmission {
            status: Some(SubmissionStatus::Rejected),
            ..Default::default()
        };
        let rejected = assert_ok!(h.store.update_submission(id, &reject, &admin()).await);
        assert_eq!(rejected.submission.status, SubmissionStatus::Rejected);
        assert!(rejected.submission.approved_date.is_none());

        let actions: Vec<AuditAction> = h
            .repo
            .audit_entries()
            .await
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::Submitted,
                AuditAction::Approved,
                AuditAction::Rejected
            ]
        );
    }

    #[tokio::test]
    async fn test_field_edit_upserts_and_leaves_other_fields() {
        let h = harness().await;
        let input = payload(
            h.form.form.id,
            json!({ "applicantName": "Ali", "loanAmount": 100 }),
        );
        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);
        let id = created.submission.id;
        let loan_field = h.form.fields[1].id;

        let patch = field_values(json!({ "loanAmount": "250" }));
        assert_ok!(h.store.update_submission(id, &patch, &admin()).await);
        let updated = assert_ok!(h.store.update_submission(id, &patch, &admin()).await);

        assert_eq!(h.repo.value_rows(id, loan_field).await, 1);
        assert_eq!(value_of(&updated, "loanAmount"), Some("250"));
        assert_eq!(value_of(&updated, "applicantName"), Some("Ali"));
    }

    #[tokio::test]
    async fn test_every_update_appends_exactly_one_audit_entry() {
        let h = harness().await;
        let input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);
        let id = created.submission.id;

        let patch = UpdateSubmission {
            status: Some(SubmissionStatus::Pending),
            notes: Some("needs payslip".to_string()),
            field_values: json!({ "loanAmount": 75 }).as_object().cloned(),
            ..Default::default()
        };
        assert_ok!(h.store.update_submission(id, &patch, &admin()).await);

        let audit = h.repo.audit_entries().await;
        assert_eq!(audit.len(), 2);
        let entry = &audit[1];
        assert_eq!(entry.action, AuditAction::Updated);
        assert_eq!(entry.changed_by, "admin1");
        assert_eq!(entry.changes["status"]["from"], json!("submitted"));
        assert_eq!(entry.changes["status"]["to"], json!("pending"));
        assert_eq!(entry.changes["notes"], json!("needs payslip"));
        assert_eq!(entry.changes["fields"], json!(["loanAmount"]));
    }

    #[tokio::test]
    async fn test_lost_audit_entries_do_not_undo_writes() {
        let h = harness().await;
        h.repo.fail_audit_inserts(u32::MAX).await;

        let input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);
        let id = created.submission.id;
        assert_eq!(h.repo.audit_insert_attempts().await, APPEND_ATTEMPTS);

        let approve = UpdateSubmission {
            status: Some(SubmissionStatus::Approved),
            ..Default::default()
        };
        let updated = assert_ok!(h.store.update_submission(id, &approve, &admin()).await);
        assert_eq!(updated.submission.status, SubmissionStatus::Approved);
        assert_eq!(h.repo.audit_insert_attempts().await, APPEND_ATTEMPTS * 2);

        let stored = h.repo.raw_submission(id).await.unwrap();
        assert_eq!(stored.status, SubmissionStatus::Approved);
        assert!(stored.approved_date.is_some());
        assert!(h.repo.audit_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_patch_is_rejected() {
        let h = harness().await;
        let input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);

        let err = assert_err!(
            h.store
                .update_submission(created.submission.id, &UpdateSubmission::default(), &admin())
                .await
        );
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.repo.audit_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_submitter_cannot_approve() {
        let h = harness().await;
        let mut input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        input.status = Some(SubmissionStatus::Draft);
        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);

        let approve = UpdateSubmission {
            status: Some(SubmissionStatus::Approved),
            ..Default::default()
        };
        assert!(matches!(
            h.store
                .update_submission(created.submission.id, &approve, &anonymous())
                .await,
            Err(AppError::Forbidden(_))
        ));

        let submit = UpdateSubmission {
            status: Some(SubmissionStatus::Submitted),
            ..Default::default()
        };
        let submitted = assert_ok!(
            h.store
                .update_submission(created.submission.id, &submit, &anonymous())
                .await
        );
        assert_eq!(submitted.submission.status, SubmissionStatus::Submitted);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_submission() {
        let h = harness().await;
        let input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);
        let id = created.submission.id;

        assert_ok!(h.store.soft_delete_submission(id, &admin()).await);

        assert!(matches!(
            h.store.get_submission(id, &Actor::anonymous()).await,
            Err(AppError::NotFound(_))
        ));
        let filter = SubmissionFilter {
            form_id: Some(h.form.form.id),
            ..Default::default()
        };
        let (listed, total) = assert_ok!(
            h.store
                .list_submissions(&filter, PageRequest { page: 1, limit: 10 })
                .await
        );
        assert!(listed.iter().all(|s| s.submission.id != id));
        assert_eq!(total, 0);
        assert!(h.repo.raw_submission(id).await.unwrap().is_deleted);

        assert!(matches!(
            h.store.soft_delete_submission(id, &admin()).await,
            Err(AppError::NotFound(_))
        ));
        let audit = h.repo.audit_entries().await;
        assert_eq!(audit.last().map(|e| e.action), Some(AuditAction::Deleted));
    }

    #[tokio::test]
    async fn test_only_admin_can_delete() {
        let h = harness().await;
        let input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);
        assert!(matches!(
            h.store
                .soft_delete_submission(created.submission.id, &anonymous())
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_field_replacement_rekeys_and_drops_orphans() {
        let h = harness().await;
        let input = payload(
            h.form.form.id,
            json!({ "applicantName": "Ali", "loanAmount": 100 }),
        );
        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);
        let id = created.submission.id;

        let update = UpdateForm {
            fields: Some(vec![
                field("applicantName", 0, FieldType::Text, true),
                field("phone", 1, FieldType::Text, false),
            ]),
            ..Default::default()
        };
        assert_ok!(h.forms.update_form(h.form.form.id, &update).await);

        let reread = assert_ok!(h.store.get_submission(id, &admin().actor).await);
        let names: Vec<&str> = reread
            .field_values
            .iter()
            .map(|v| v.field_name.as_str())
            .collect();
        assert_eq!(names, vec!["applicantName"]);
        assert_eq!(value_of(&reread, "applicantName"), Some("Ali"));
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paged() {
        let h = harness().await;
        let mut ids = Vec::new();
        for name in ["Ali", "Siti", "Omar"] {
            let input = payload(h.form.form.id, json!({ "applicantName": name }));
            let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);
            ids.push(created.submission.id);
        }

        let (page, total) = assert_ok!(
            h.store
                .list_submissions(&SubmissionFilter::default(), PageRequest { page: 1, limit: 2 })
                .await
        );
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].submission.id, ids[2]);
        assert_eq!(page[1].submission.id, ids[1]);
        assert_eq!(value_of(&page[0], "applicantName"), Some("Omar"));
        assert_eq!(page[0].form_name.as_deref(), Some("Zakat Application"));
    }

    #[tokio::test]
    async fn test_list_far_past_the_end_is_empty() {
        let h = harness().await;
        let input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        assert_ok!(h.store.create_submission(&input, &anonymous()).await);

        let page = PageRequest {
            page: i64::MAX / 2,
            limit: 10,
        };
        let (listed, total) = assert_ok!(
            h.store
                .list_submissions(&SubmissionFilter::default(), page)
                .await
        );
        assert!(listed.is_empty());
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_member_submission_is_private_to_member() {
        let h = harness().await;
        let mut input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        input.member_computer_id = Some("M-100".to_string());
        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);

        let stranger = Actor::Submitter {
            identity: "M-200".to_string(),
        };
        assert!(matches!(
            h.store.get_submission(created.submission.id, &stranger).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let h = harness().await;
        for status in [
            SubmissionStatus::Draft,
            SubmissionStatus::Submitted,
            SubmissionStatus::Submitted,
        ] {
            let mut input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
            input.status = Some(status);
            assert_ok!(h.store.create_submission(&input, &anonymous()).await);
        }

        let stats = assert_ok!(h.store.stats(&SubmissionFilter::default()).await);
        assert_eq!(stats.total_submissions, 3);
        assert_eq!(stats.by_status.get("submitted"), Some(&2));
        assert_eq!(stats.by_status.get("draft"), Some(&1));
        assert_eq!(stats.recent_submissions.len(), 3);
    }

    #[tokio::test]
    async fn test_form_with_live_submissions_is_deactivated_not_deleted() {
        let h = harness().await;
        let input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        assert_ok!(h.store.create_submission(&input, &anonymous()).await);

        let outcome = assert_ok!(h.forms.delete_form(h.form.form.id).await);
        assert_eq!(outcome, DeleteOutcome::Deactivated);
        let form = assert_ok!(h.forms.get_form(h.form.form.id).await);
        assert!(!form.form.is_active);
    }

    #[tokio::test]
    async fn test_form_with_only_soft_deleted_submissions_keeps_them() {
        let h = harness().await;
        let input = payload(h.form.form.id, json!({ "applicantName": "Ali" }));
        let created = assert_ok!(h.store.create_submission(&input, &anonymous()).await);
        let id = created.submission.id;
        assert_ok!(h.store.soft_delete_submission(id, &admin()).await);

        let outcome = assert_ok!(h.forms.delete_form(h.form.form.id).await);
        assert_eq!(outcome, DeleteOutcome::Deactivated);
        assert_ok!(h.forms.get_form(h.form.form.id).await);

        let kept = h.repo.raw_submission(id).await.unwrap();
        assert!(kept.is_deleted);
        let name_field = h.form.fields[0].id;
        assert_eq!(h.repo.value_rows(id, name_field).await, 1);
    }
}
