//! Lifecycle of an absence explanation: `Pending` is the only state a
//! submission is created in, and `Approved` / `Rejected` are terminal.

use thiserror::Error;

use crate::db::types::{AbsenceStatus, UserRole};

pub(crate) const DEFAULT_APPROVAL_COMMENT: &str = "Approved by Teacher/Admin.";
pub(crate) const MAX_REASON_LEN: usize = 2000;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum WorkflowError {
    #[error("Only teachers and admins can review absences")]
    NotPermitted,
    #[error("Invalid status")]
    InvalidTarget,
    #[error("A comment is required when rejecting an absence")]
    CommentRequired,
    #[error("Absence has already been {}", .0.as_str())]
    AlreadyFinalized(AbsenceStatus),
    #[error("Reason must not be empty")]
    EmptyReason,
    #[error("Reason must be at most {} characters", MAX_REASON_LEN)]
    ReasonTooLong,
}

/// The state and comment a review will persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Review {
    pub(crate) status: AbsenceStatus,
    pub(crate) comment: String,
}

/// Decides a staff review. The reviewer's role is checked first so a student
/// always gets an authorization failure regardless of the payload.
pub(crate) fn review(
    current: AbsenceStatus,
    reviewer: UserRole,
    target: AbsenceStatus,
    comment: Option<&str>,
) -> Result<Review, WorkflowError> {
    if !reviewer.is_staff() {
        return Err(WorkflowError::NotPermitted);
    }

    if target == AbsenceStatus::Pending {
        return Err(WorkflowError::InvalidTarget);
    }

    if current.is_terminal() {
        return Err(WorkflowError::AlreadyFinalized(current));
    }

    let comment = comment.map(str::trim).filter(|value| !value.is_empty());

    match target {
        AbsenceStatus::Approved => Ok(Review {
            status: AbsenceStatus::Approved,
            comment: comment.unwrap_or(DEFAULT_APPROVAL_COMMENT).to_string(),
        }),
        AbsenceStatus::Rejected => {
            let comment = comment.ok_or(WorkflowError::CommentRequired)?;
            Ok(Review { status: AbsenceStatus::Rejected, comment: comment.to_string() })
        }
        AbsenceStatus::Pending => Err(WorkflowError::InvalidTarget),
    }
}

/// Normalises the free-text reason of a new submission.
pub(crate) fn submission_reason(raw: &str) -> Result<String, WorkflowError> {
    let reason = raw.trim();
    if reason.is_empty() {
        return Err(WorkflowError::EmptyReason);
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(WorkflowError::ReasonTooLong);
    }
    Ok(reason.to_string())
}

/// Parses the `status` field of a review request. Only the two terminal
/// states are accepted as targets.
pub(crate) fn parse_target(raw: &str) -> Result<AbsenceStatus, WorkflowError> {
    match raw.trim() {
        "Approved" | "approved" => Ok(AbsenceStatus::Approved),
        "Rejected" | "rejected" => Ok(AbsenceStatus::Rejected),
        _ => Err(WorkflowError::InvalidTarget),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_without_comment_uses_default() {
        let review =
            review(AbsenceStatus::Pending, UserRole::Teacher, AbsenceStatus::Approved, None)
                .unwrap();
        assert_eq!(review.status, AbsenceStatus::Approved);
        assert_eq!(review.comment, DEFAULT_APPROVAL_COMMENT);
    }

    #[test]
    fn approve_keeps_explicit_comment() {
        let review = review(
            AbsenceStatus::Pending,
            UserRole::Admin,
            AbsenceStatus::Approved,
            Some("  Doctor's note received "),
        )
        .unwrap();
        assert_eq!(review.comment, "Doctor's note received");
    }

    #[test]
    fn reject_requires_non_empty_comment() {
        for comment in [None, Some(""), Some("   ")] {
            let err =
                review(AbsenceStatus::Pending, UserRole::Teacher, AbsenceStatus::Rejected, comment)
                    .unwrap_err();
            assert_eq!(err, WorkflowError::CommentRequired);
        }
    }

    #[test]
    fn reject_with_comment_succeeds() {
        let review = review(
            AbsenceStatus::Pending,
            UserRole::Teacher,
            AbsenceStatus::Rejected,
            Some("No evidence provided"),
        )
        .unwrap();
        assert_eq!(review.status, AbsenceStatus::Rejected);
        assert_eq!(review.comment, "No evidence provided");
    }

    #[test]
    fn terminal_states_accept_no_transition() {
        for current in [AbsenceStatus::Approved, AbsenceStatus::Rejected] {
            for target in [AbsenceStatus::Approved, AbsenceStatus::Rejected] {
                let err = review(current, UserRole::Admin, target, Some("again")).unwrap_err();
                assert_eq!(err, WorkflowError::AlreadyFinalized(current));
            }
        }
    }

    #[test]
    fn students_cannot_review_even_with_valid_payload() {
        let err = review(
            AbsenceStatus::Pending,
            UserRole::Student,
            AbsenceStatus::Approved,
            Some("self-approve"),
        )
        .unwrap_err();
        assert_eq!(err, WorkflowError::NotPermitted);

        let err = review(AbsenceStatus::Approved, UserRole::Student, AbsenceStatus::Rejected, None)
            .unwrap_err();
        assert_eq!(err, WorkflowError::NotPermitted);
    }

    #[test]
    fn pending_is_not_a_valid_target() {
        let err = review(AbsenceStatus::Pending, UserRole::Admin, AbsenceStatus::Pending, None)
            .unwrap_err();
        assert_eq!(err, WorkflowError::InvalidTarget);
    }

    #[test]
    fn parse_target_accepts_only_terminal_states() {
        assert_eq!(parse_target("Approved"), Ok(AbsenceStatus::Approved));
        assert_eq!(parse_target("rejected"), Ok(AbsenceStatus::Rejected));
        assert_eq!(parse_target("Pending"), Err(WorkflowError::InvalidTarget));
        assert_eq!(parse_target("cancelled"), Err(WorkflowError::InvalidTarget));
    }

    #[test]
    fn submission_reason_is_trimmed_and_required() {
        assert_eq!(submission_reason("  Flu  ").unwrap(), "Flu");
        assert_eq!(submission_reason(" \n").unwrap_err(), WorkflowError::EmptyReason);
        let long = "x".repeat(MAX_REASON_LEN + 1);
        assert_eq!(submission_reason(&long).unwrap_err(), WorkflowError::ReasonTooLong);
    }
}
