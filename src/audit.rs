//! Append-only audit trail for submissions
//!
//! Appends run beside the primary write. A failed append is retried a few
//! times and then logged; it never undoes the mutation it describes.

use crate::error::AppError;
use crate::models::{AuditFilter, FormAuditLog, NewAuditEntry, PageRequest};
use crate::repository::FormRepository;
use std::time::Duration;

pub(crate) const APPEND_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Clone)]
pub struct AuditLog<R> {
    repo: R,
}

impl<R: FormRepository> AuditLog<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Best-effort append. Returns the stored entry, or `None` once every
    /// attempt has failed.
    pub async fn append(&self, entry: NewAuditEntry) -> Option<FormAuditLog> {
        for attempt in 1..=APPEND_ATTEMPTS {
            match self.repo.insert_audit(entry.clone()).await {
                Ok(log) => return Some(log),
                Err(e) if attempt < APPEND_ATTEMPTS => {
                    tracing::warn!(
                        "Audit append for submission {:?} failed (attempt {}): {}",
                        entry.submission_id,
                        attempt,
                        e
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => {
                    tracing::error!(
                        action = ?entry.action,
                        submission_id = ?entry.submission_id,
                        changed_by = %entry.changed_by,
                        "Audit entry lost after {} attempts: {}",
                        APPEND_ATTEMPTS,
                        e
                    );
                }
            }
        }
        None
    }

    /// Entries newest first.
    pub async fn list(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<(Vec<FormAuditLog>, i64), AppError> {
        self.repo
            .list_audit(filter, page)
            .await
            .map_err(AppError::storage("load audit logs"))
    }
}
