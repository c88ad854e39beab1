//! Approval workflow for budgets sent to the patient.
//!
//! `in_progress -> awaiting_patient -> {approved | revision_requested | rejected}`.
//! Whether `revision_requested` may go back to `awaiting_patient` is a policy
//! switch, off unless configured.

use chrono::{DateTime, Utc};

use crate::error::ApprovalError;
use crate::models::{DecisionUpdate, TrackingStatus, UserBudgetTracking, UserDecision};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalPolicy {
    pub allow_revision_cycle: bool,
}

impl ApprovalPolicy {
    /// Statuses from which a budget may be attached and sent for review.
    pub fn can_attach_from(&self, status: TrackingStatus) -> bool {
        match status {
            TrackingStatus::InProgress => true,
            TrackingStatus::RevisionRequested => self.allow_revision_cycle,
            _ => false,
        }
    }
}

/// Validated transition to `awaiting_patient`. Returns the status the write must expect.
pub fn attach_budget(
    record: &UserBudgetTracking,
    policy: ApprovalPolicy,
) -> Result<TrackingStatus, ApprovalError> {
    if policy.can_attach_from(record.status) {
        Ok(record.status)
    } else {
        Err(ApprovalError::CannotAttachBudget { current: record.status })
    }
}

/// Builds the update for a user's decision. Rejected unless the record awaits the patient.
pub fn record_user_decision(
    record: &UserBudgetTracking,
    decision: UserDecision,
    feedback: Option<String>,
    now: DateTime<Utc>,
) -> Result<DecisionUpdate, ApprovalError> {
    if record.status != TrackingStatus::AwaitingPatient {
        return Err(ApprovalError::NotAwaitingPatient { current: record.status });
    }

    // Blank means no feedback; anything else is kept as typed.
    let user_feedback = feedback.filter(|f| !f.trim().is_empty());

    Ok(DecisionUpdate {
        user_approval: decision,
        status: decision.status(),
        user_feedback,
        updated_at: now,
    })
}
