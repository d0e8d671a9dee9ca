//! Form definition store
//!
//! Owns form schemas: creation with an ordered field set, lookup by id or by
//! type, partial updates with full field-set replacement, and retirement.

use crate::codec::{decode_field, encode_field};
use crate::error::AppError;
use crate::models::{
    CreateForm, DeleteOutcome, Form, FormField, FormFilter, FormSummary, FormWithFields, NewForm,
    PageRequest, UpdateForm,
};
use crate::repository::FormRepository;
use crate::validation::{validate_form_definition, validate_form_update};
use uuid::Uuid;

#[derive(Clone)]
pub struct FormStore<R> {
    repo: R,
}

impl<R: FormRepository> FormStore<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn create_form(&self, input: &CreateForm) -> Result<FormWithFields, AppError> {
        let def = validate_form_definition(input)?;

        let fields = def.fields.iter().map(encode_field).collect();
        let new_form = NewForm {
            name: def.name,
            description: def.description,
            form_type: def.form_type,
            version: def.version,
            is_active: def.is_active,
            document_name: def.document_name,
            document_url: def.document_url,
        };

        let (form, rows) = self
            .repo
            .insert_form(new_form, fields)
            .await
            .map_err(AppError::storage("create form"))?;

        Ok(FormWithFields {
            form,
            fields: rows.into_iter().map(decode_field).collect(),
        })
    }

    pub async fn get_form(&self, id: Uuid) -> Result<FormWithFields, AppError> {
        let form = self
            .repo
            .find_form(id)
            .await
            .map_err(AppError::storage("load form"))?
            .ok_or_else(|| AppError::NotFound("Form not found".to_string()))?;
        self.with_fields(form).await
    }

    /// The active form serving a type.
    pub async fn get_form_by_type(&self, form_type: &str) -> Result<FormWithFields, AppError> {
        let form = self
            .repo
            .find_active_form_by_type(&form_type.trim().to_lowercase())
            .await
            .map_err(AppError::storage("load form"))?
            .ok_or_else(|| {
                AppError::NotFound(format!("No active form found for type '{}'", form_type))
            })?;
        self.with_fields(form).await
    }

    pub async fn list_forms(
        &self,
        filter: &FormFilter,
        page: PageRequest,
    ) -> Result<(Vec<FormSummary>, i64), AppError> {
        self.repo
            .list_forms(filter, page)
            .await
            .map_err(AppError::storage("list forms"))
    }

    /// Current decoded fields of a form, in field order.
    pub async fn fields(&self, form_id: Uuid) -> Result<Vec<FormField>, AppError> {
        let rows = self
            .repo
            .fields_for_form(form_id)
            .await
            .map_err(AppError::storage("load form fields"))?;
        Ok(rows.into_iter().map(decode_field).collect())
    }

    /// Merge scalar changes and optionally replace the whole field set.
    ///
    /// Every successful update bumps the version. Blanking the document
    /// reference is refused before anything is written.
    pub async fn update_form(&self, id: Uuid, input: &UpdateForm) -> Result<FormWithFields, AppError> {
        let blanks_document = [&input.document_name, &input.document_url]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| s.trim().is_empty()));
        if blanks_document {
            return Err(AppError::Conflict(
                "The form's source document reference cannot be removed".to_string(),
            ));
        }

        let patch = validate_form_update(input)?;
        let fields = patch
            .fields
            .as_ref()
            .map(|fields| fields.iter().map(encode_field).collect());

        let form = self
            .repo
            .update_form(id, patch.changes, fields)
            .await
            .map_err(AppError::storage("update form"))?
            .ok_or_else(|| AppError::NotFound("Form not found".to_string()))?;

        tracing::info!("Form {} updated to version {}", form.id, form.version);
        self.with_fields(form).await
    }

    /// Deactivate a form that has any stored submission, delete it otherwise.
    ///
    /// Soft-deleted submissions count too: they stay in storage for the audit
    /// trail, so their form must outlive them.
    pub async fn delete_form(&self, id: Uuid) -> Result<DeleteOutcome, AppError> {
        let form = self
            .repo
            .find_form(id)
            .await
            .map_err(AppError::storage("delete form"))?
            .ok_or_else(|| AppError::NotFound("Form not found".to_string()))?;

        let submissions = self
            .repo
            .count_submissions(form.id)
            .await
            .map_err(AppError::storage("delete form"))?;

        if submissions > 0 {
            self.repo
                .deactivate_form(form.id)
                .await
                .map_err(AppError::storage("deactivate form"))?;
            tracing::info!(
                "Form {} has {} submission(s); deactivated instead of deleted",
                form.id,
                submissions
            );
            return Ok(DeleteOutcome::Deactivated);
        }

        let deleted = self
            .repo
            .delete_form(form.id)
            .await
            .map_err(AppError::storage("delete form"))?;
        if !deleted {
            return Err(AppError::NotFound("Form not found".to_string()));
        }
        Ok(DeleteOutcome::Deleted)
    }

    async fn with_fields(&self, form: Form) -> Result<FormWithFields, AppError> {
        let fields = self.fields(form.id).await?;
        Ok(FormWithFields { form, fields })
    }
}
