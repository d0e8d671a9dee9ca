//! Approval workflow
//!
//! Decides who may move a submission between statuses. The allowed moves
//! live in one table; every status change goes through
//! `SubmissionStore::update_submission` so the audit append always happens.

use crate::error::AppError;
use crate::models::{AuditAction, FormSubmission, SubmissionStatus, UpdateSubmission};
use crate::models::SubmissionStatus::*;

/// The identity acting on a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Admin { username: String },
    Submitter { identity: String },
}

impl Actor {
    pub fn anonymous() -> Self {
        Actor::Submitter {
            identity: "anonymous".to_string(),
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            Actor::Admin { username } => username,
            Actor::Submitter { identity } => identity,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin { .. })
    }
}

/// Allowed `(from, to)` status moves. Writing the current status again is
/// always allowed.
const TRANSITIONS: &[(SubmissionStatus, SubmissionStatus)] = &[
    (Draft, Submitted),
    (Draft, Pending),
    (Submitted, Pending),
    (Submitted, Approved),
    (Submitted, Rejected),
    (Pending, Submitted),
    (Pending, Approved),
    (Pending, Rejected),
    (Approved, Rejected),
    (Rejected, Approved),
    (Rejected, Pending),
];

pub fn is_transition_allowed(from: SubmissionStatus, to: SubmissionStatus) -> bool {
    from == to || TRANSITIONS.contains(&(from, to))
}

/// Statuses a submission may start in.
pub fn authorize_create(status: SubmissionStatus) -> Result<(), AppError> {
    match status {
        Draft | Submitted | Pending => Ok(()),
        other => Err(AppError::InvalidTransition(format!(
            "New submissions cannot start as {}",
            other.as_str()
        ))),
    }
}

/// Check that `actor` may apply `patch` to `current`.
pub fn authorize_update(
    actor: &Actor,
    current: &FormSubmission,
    patch: &UpdateSubmission,
) -> Result<(), AppError> {
    if !actor.is_admin() {
        authorize_submitter(actor, current, patch)?;
    }

    if let Some(next) = patch.status {
        if !is_transition_allowed(current.status, next) {
            return Err(AppError::InvalidTransition(format!(
                "Cannot move a submission from {} to {}",
                current.status.as_str(),
                next.as_str()
            )));
        }
    }

    Ok(())
}

/// Check that `actor` may soft-delete a submission.
pub fn authorize_delete(actor: &Actor) -> Result<(), AppError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only administrators can delete submissions".to_string(),
        ))
    }
}

/// Whether `actor` may read a submission.
pub fn can_view(actor: &Actor, submission: &FormSubmission) -> bool {
    actor.is_admin() || owns(actor, submission)
}

/// Submitters own anonymous submissions by id alone; member submissions
/// only match the same member.
fn owns(actor: &Actor, submission: &FormSubmission) -> bool {
    match submission.member_computer_id {
        Some(ref member) => actor.identity() == member,
        None => true,
    }
}

fn authorize_submitter(
    actor: &Actor,
    current: &FormSubmission,
    patch: &UpdateSubmission,
) -> Result<(), AppError> {
    if !owns(actor, current) {
        return Err(AppError::Forbidden(
            "You can only change your own submissions".to_string(),
        ));
    }
    if current.status != Draft {
        return Err(AppError::Forbidden(
            "Only draft submissions can be changed by the submitter".to_string(),
        ));
    }
    if patch.approved_by.is_some() {
        return Err(AppError::Forbidden(
            "Only administrators can record an approver".to_string(),
        ));
    }
    if let Some(status) = patch.status {
        if !matches!(status, Draft | Submitted | Pending) {
            return Err(AppError::Forbidden(
                "Only administrators can approve or reject submissions".to_string(),
            ));
        }
    }
    Ok(())
}

/// Audit tag describing an update.
pub fn audit_action_for(from: SubmissionStatus, to: Option<SubmissionStatus>) -> AuditAction {
    match to {
        Some(Approved) if from != Approved => AuditAction::Approved,
        Some(Rejected) if from != Rejected => AuditAction::Rejected,
        Some(Submitted | Pending) if from == Draft => AuditAction::Submitted,
        _ => AuditAction::Updated,
    }
}
