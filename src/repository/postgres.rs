//! Postgres implementation of [`FormRepository`]

use super::FormRepository;
use crate::models::{
    AuditFilter, FieldValueInput, FieldValueRow, Form, FormAuditLog, FormChanges, FormFieldRow,
    FormFilter, FormSubmission, FormSummary, NewAuditEntry, NewForm, NewFormField, NewSubmission,
    PageRequest, SubmissionChanges, SubmissionFilter, SubmissionStatus,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Repository backed by the shared connection pool.
#[derive(Clone)]
pub struct PgFormRepository {
    pool: PgPool,
}

impl PgFormRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SUBMISSION_FILTER: &str = r#"
    is_deleted = FALSE
    AND ($1::uuid IS NULL OR form_id = $1)
    AND ($2::form_submission_status IS NULL OR status = $2)
    AND ($3::text IS NULL OR member_computer_id = $3)
"#;

async fn insert_fields(
    tx: &mut Transaction<'_, Postgres>,
    form_id: Uuid,
    fields: Vec<NewFormField>,
) -> Result<Vec<FormFieldRow>, sqlx::Error> {
    let mut rows = Vec::with_capacity(fields.len());
    for field in fields {
        let row = sqlx::query_as::<_, FormFieldRow>(
            r#"
            INSERT INTO form_fields (
                form_id, field_name, field_label, field_type, field_order,
                is_required, is_hidden, placeholder, help_text, default_value,
                column_width, options, validation_rule
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(form_id)
        .bind(&field.field_name)
        .bind(&field.field_label)
        .bind(field.field_type)
        .bind(field.field_order)
        .bind(field.is_required)
        .bind(field.is_hidden)
        .bind(&field.placeholder)
        .bind(&field.help_text)
        .bind(&field.default_value)
        .bind(&field.column_width)
        .bind(&field.options)
        .bind(&field.validation_rule)
        .fetch_one(&mut **tx)
        .await?;
        rows.push(row);
    }
    rows.sort_by_key(|f| f.field_order);
    Ok(rows)
}

async fn deactivate_siblings(
    tx: &mut Transaction<'_, Postgres>,
    form: &Form,
) -> Result<(), sqlx::Error> {
    if !form.is_active {
        return Ok(());
    }
    let result = sqlx::query(
        r#"
        UPDATE forms SET is_active = FALSE, updated_at = NOW()
        WHERE form_type = $1 AND id <> $2 AND is_active = TRUE
        "#,
    )
    .bind(&form.form_type)
    .bind(form.id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() > 0 {
        tracing::info!(
            "Deactivated {} older form(s) of type {}",
            result.rows_affected(),
            form.form_type
        );
    }
    Ok(())
}

async fn upsert_values(
    tx: &mut Transaction<'_, Postgres>,
    submission_id: Uuid,
    values: &[FieldValueInput],
) -> Result<(), sqlx::Error> {
    for value in values {
        sqlx::query(
            r#"
            INSERT INTO form_field_values (submission_id, field_id, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (submission_id, field_id)
            DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(submission_id)
        .bind(value.field_id)
        .bind(&value.value)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

impl FormRepository for PgFormRepository {
    async fn insert_form(
        &self,
        form: NewForm,
        fields: Vec<NewFormField>,
    ) -> Result<(Form, Vec<FormFieldRow>), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Form>(
            r#"
            INSERT INTO forms (name, description, form_type, version, is_active, document_name, document_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&form.name)
        .bind(&form.description)
        .bind(&form.form_type)
        .bind(form.version)
        .bind(form.is_active)
        .bind(&form.document_name)
        .bind(&form.document_url)
        .fetch_one(&mut *tx)
        .await?;

        let rows = insert_fields(&mut tx, created.id, fields).await?;
        deactivate_siblings(&mut tx, &created).await?;

        tx.commit().await?;
        Ok((created, rows))
    }

    async fn find_form(&self, id: Uuid) -> Result<Option<Form>, sqlx::Error> {
        sqlx::query_as::<_, Form>("SELECT * FROM forms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_active_form_by_type(&self, form_type: &str) -> Result<Option<Form>, sqlx::Error> {
        sqlx::query_as::<_, Form>(
            r#"
            SELECT * FROM forms
            WHERE form_type = $1 AND is_active = TRUE
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(form_type)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_forms(
        &self,
        filter: &FormFilter,
        page: PageRequest,
    ) -> Result<(Vec<FormSummary>, i64), sqlx::Error> {
        let forms = sqlx::query_as::<_, FormSummary>(
            r#"
            SELECT f.*,
                (SELECT COUNT(*) FROM form_fields ff WHERE ff.form_id = f.id) AS field_count,
                (SELECT COUNT(*) FROM form_submissions s
                    WHERE s.form_id = f.id AND s.is_deleted = FALSE) AS submission_count
            FROM forms f
            WHERE ($1::text IS NULL OR f.form_type = $1)
              AND ($2::boolean IS NULL OR f.is_active = $2)
            ORDER BY f.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filter.form_type)
        .bind(filter.is_active)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM forms
            WHERE ($1::text IS NULL OR form_type = $1)
              AND ($2::boolean IS NULL OR is_active = $2)
            "#,
        )
        .bind(&filter.form_type)
        .bind(filter.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok((forms, total))
    }

    async fn fields_for_form(&self, form_id: Uuid) -> Result<Vec<FormFieldRow>, sqlx::Error> {
        sqlx::query_as::<_, FormFieldRow>(
            "SELECT * FROM form_fields WHERE form_id = $1 ORDER BY field_order, created_at",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn update_form(
        &self,
        id: Uuid,
        changes: FormChanges,
        fields: Option<Vec<NewFormField>>,
    ) -> Result<Option<Form>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Form>(
            r#"
            UPDATE forms SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                form_type = COALESCE($4, form_type),
                is_active = COALESCE($5, is_active),
                document_name = COALESCE($6, document_name),
                document_url = COALESCE($7, document_url),
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(&changes.form_type)
        .bind(changes.is_active)
        .bind(&changes.document_name)
        .bind(&changes.document_url)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            return Ok(None);
        };

        if let Some(fields) = fields {
            let old_ids: Vec<Uuid> =
                sqlx::query_scalar("SELECT id FROM form_fields WHERE form_id = $1")
                    .bind(id)
                    .fetch_all(&mut *tx)
                    .await?;

            let new_rows = insert_fields(&mut tx, id, fields).await?;
            let new_ids: Vec<Uuid> = new_rows.iter().map(|f| f.id).collect();

            // Re-key stored answers to the replacement field with the same name.
            let rekeyed = sqlx::query(
                r#"
                UPDATE form_field_values v
                SET field_id = n.id, updated_at = NOW()
                FROM form_fields o, form_fields n
                WHERE v.field_id = o.id
                  AND o.id = ANY($1)
                  AND n.id = ANY($2)
                  AND o.field_name = n.field_name
                "#,
            )
            .bind(&old_ids)
            .bind(&new_ids)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM form_fields WHERE id = ANY($1)")
                .bind(&old_ids)
                .execute(&mut *tx)
                .await?;

            tracing::info!(
                "Replaced {} field(s) of form {} with {}, re-keyed {} value(s)",
                old_ids.len(),
                id,
                new_ids.len(),
                rekeyed.rows_affected()
            );
        }

        deactivate_siblings(&mut tx, &updated).await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn count_submissions(&self, form_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM form_submissions WHERE form_id = $1")
        .bind(form_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn deactivate_form(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE forms SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_form(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        // CASCADE removes form_fields; form_submissions RESTRICTs
        let result = sqlx::query("DELETE FROM forms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_submission(
        &self,
        submission: NewSubmission,
        values: Vec<FieldValueInput>,
    ) -> Result<Option<FormSubmission>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Blocks a concurrent field replacement until this insert commits
        let version: Option<i32> =
            sqlx::query_scalar("SELECT version FROM forms WHERE id = $1 FOR SHARE")
                .bind(submission.form_id)
                .fetch_optional(&mut *tx)
                .await?;
        if version != Some(submission.form_version) {
            return Ok(None);
        }

        let created = sqlx::query_as::<_, FormSubmission>(
            r#"
            INSERT INTO form_submissions (
                form_id, status, member_computer_id, submitted_by,
                ip_address, user_agent, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(submission.form_id)
        .bind(submission.status)
        .bind(&submission.member_computer_id)
        .bind(&submission.submitted_by)
        .bind(&submission.ip_address)
        .bind(&submission.user_agent)
        .bind(&submission.notes)
        .fetch_one(&mut *tx)
        .await?;

        upsert_values(&mut tx, created.id, &values).await?;

        tx.commit().await?;
        Ok(Some(created))
    }

    async fn find_submission(&self, id: Uuid) -> Result<Option<FormSubmission>, sqlx::Error> {
        sqlx::query_as::<_, FormSubmission>(
            "SELECT * FROM form_submissions WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
        page: PageRequest,
    ) -> Result<(Vec<FormSubmission>, i64), sqlx::Error> {
        let submissions = sqlx::query_as::<_, FormSubmission>(&format!(
            "SELECT * FROM form_submissions WHERE {} ORDER BY submission_date DESC LIMIT $4 OFFSET $5",
            SUBMISSION_FILTER
        ))
        .bind(filter.form_id)
        .bind(filter.status)
        .bind(&filter.member_computer_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM form_submissions WHERE {}",
            SUBMISSION_FILTER
        ))
        .bind(filter.form_id)
        .bind(filter.status)
        .bind(&filter.member_computer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((submissions, total))
    }

    async fn all_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> Result<Vec<FormSubmission>, sqlx::Error> {
        sqlx::query_as::<_, FormSubmission>(&format!(
            "SELECT * FROM form_submissions WHERE {} ORDER BY submission_date DESC",
            SUBMISSION_FILTER
        ))
        .bind(filter.form_id)
        .bind(filter.status)
        .bind(&filter.member_computer_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn field_values(&self, submission_ids: &[Uuid]) -> Result<Vec<FieldValueRow>, sqlx::Error> {
        if submission_ids.is_empty() {
            return Ok(Vec::new());
        }
        // Inner join drops values orphaned by a field-set replacement
        sqlx::query_as::<_, FieldValueRow>(
            r#"
            SELECT v.submission_id, v.field_id, f.field_name, f.field_label,
                   f.field_type, f.field_order, v.value
            FROM form_field_values v
            JOIN form_fields f ON f.id = v.field_id
            WHERE v.submission_id = ANY($1)
            ORDER BY v.submission_id, f.field_order
            "#,
        )
        .bind(submission_ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn update_submission(
        &self,
        id: Uuid,
        changes: SubmissionChanges,
        values: Vec<FieldValueInput>,
    ) -> Result<Option<FormSubmission>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let (write_approved_date, approved_date) = match changes.approved_date {
            Some(date) => (true, date),
            None => (false, None),
        };

        let updated = sqlx::query_as::<_, FormSubmission>(
            r#"
            UPDATE form_submissions SET
                status = COALESCE($2, status),
                notes = COALESCE($3, notes),
                approved_by = COALESCE($4, approved_by),
                approved_date = CASE WHEN $5 THEN $6 ELSE approved_date END,
                updated_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.status)
        .bind(&changes.notes)
        .bind(&changes.approved_by)
        .bind(write_approved_date)
        .bind(approved_date)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            return Ok(None);
        };

        upsert_values(&mut tx, id, &values).await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn soft_delete_submission(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE form_submissions SET is_deleted = TRUE, updated_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn status_counts(
        &self,
        filter: &SubmissionFilter,
    ) -> Result<Vec<(SubmissionStatus, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (SubmissionStatus, i64)>(&format!(
            "SELECT status, COUNT(*) FROM form_submissions WHERE {} GROUP BY status",
            SUBMISSION_FILTER
        ))
        .bind(filter.form_id)
        .bind(filter.status)
        .bind(&filter.member_computer_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn insert_audit(&self, entry: NewAuditEntry) -> Result<FormAuditLog, sqlx::Error> {
        sqlx::query_as::<_, FormAuditLog>(
            r#"
            INSERT INTO form_audit_logs (submission_id, action, changed_by, changes, ip_address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(entry.submission_id)
        .bind(entry.action)
        .bind(&entry.changed_by)
        .bind(&entry.changes)
        .bind(&entry.ip_address)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_audit(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<(Vec<FormAuditLog>, i64), sqlx::Error> {
        let entries = sqlx::query_as::<_, FormAuditLog>(
            r#"
            SELECT * FROM form_audit_logs
            WHERE ($1::uuid IS NULL OR submission_id = $1)
              AND ($2::form_audit_action IS NULL OR action = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.submission_id)
        .bind(filter.action)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM form_audit_logs
            WHERE ($1::uuid IS NULL OR submission_id = $1)
              AND ($2::form_audit_action IS NULL OR action = $2)
            "#,
        )
        .bind(filter.submission_id)
        .bind(filter.action)
        .fetch_one(&self.pool)
        .await?;

        Ok((entries, total))
    }
}
