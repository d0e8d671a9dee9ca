//! Tabular export of submissions
//!
//! Columns are the submission metadata followed by one column per field.
//! When the export is scoped to a form the field columns come from that
//! form's current definition; otherwise they are the union of the fields
//! seen across the exported submissions, in order of first appearance.

use crate::error::AppError;
use crate::models::{FieldValueRow, FormSubmission, SubmissionFilter};
use crate::repository::FormRepository;
use std::collections::HashMap;
use uuid::Uuid;

const METADATA_HEADERS: [&str; 4] = ["Submission ID", "Status", "Submitted By", "Submission Date"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    /// Render as CSV with every cell quoted.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        write_record(&mut out, &self.headers);
        for row in &self.rows {
            write_record(&mut out, row);
        }
        out
    }
}

/// A field column, matched against values by field name.
struct Column {
    field_name: String,
    label: String,
}

pub async fn export_submissions<R: FormRepository>(
    repo: &R,
    filter: &SubmissionFilter,
) -> Result<ExportTable, AppError> {
    let submissions = repo
        .all_submissions(filter)
        .await
        .map_err(AppError::storage("export submissions"))?;
    if submissions.is_empty() {
        return Err(AppError::NotFound(
            "No submissions found to export".to_string(),
        ));
    }

    let ids: Vec<Uuid> = submissions.iter().map(|s| s.id).collect();
    let mut values = repo
        .field_values(&ids)
        .await
        .map_err(AppError::storage("export submissions"))?;
    values.sort_by_key(|v| v.field_order);

    let columns = match filter.form_id {
        Some(form_id) => repo
            .fields_for_form(form_id)
            .await
            .map_err(AppError::storage("export submissions"))?
            .into_iter()
            .map(|f| Column {
                field_name: f.field_name,
                label: f.field_label,
            })
            .collect(),
        None => union_columns(&submissions, &values),
    };

    let mut by_submission: HashMap<Uuid, HashMap<&str, &str>> = HashMap::new();
    for row in &values {
        if let Some(value) = row.value.as_deref() {
            by_submission
                .entry(row.submission_id)
                .or_default()
                .insert(row.field_name.as_str(), value);
        }
    }

    let mut headers: Vec<String> = METADATA_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.extend(columns.iter().map(|c| c.label.clone()));

    let rows = submissions
        .iter()
        .map(|submission| {
            let cells = by_submission.get(&submission.id);
            let mut row = vec![
                submission.id.to_string(),
                submission.status.as_str().to_string(),
                submission.submitted_by.clone().unwrap_or_default(),
                submission
                    .submission_date
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            ];
            row.extend(columns.iter().map(|column| {
                cells
                    .and_then(|c| c.get(column.field_name.as_str()))
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            }));
            row
        })
        .collect();

    tracing::info!("Exported {} submission(s)", submissions.len());
    Ok(ExportTable { headers, rows })
}

fn union_columns(submissions: &[FormSubmission], values: &[FieldValueRow]) -> Vec<Column> {
    let mut columns: Vec<Column> = Vec::new();
    for submission in submissions {
        for row in values.iter().filter(|v| v.submission_id == submission.id) {
            if !columns.iter().any(|c| c.field_name == row.field_name) {
                columns.push(Column {
                    field_name: row.field_name.clone(),
                    label: row.field_label.clone(),
                });
            }
        }
    }
    columns
}

fn write_record(out: &mut String, cells: &[String]) {
    let quoted: Vec<String> = cells
        .iter()
        .map(|cell| format!("\"{}\"", cell.replace('"', "\"\"")))
        .collect();
    out.push_str(&quoted.join(","));
    out.push('\n');
}
