//! Submission and approval gate
//!
//! Reads current workflow state and answers immediately; nothing here waits
//! on the transition engine.

use crate::error::{AcadflowError, Result};
use crate::models::{
    Deadline, PhaseVariant, StepKey, Submission, SubmissionKind, WorkflowStepState,
};
use crate::repositories::{DeadlineRepository, StepDefinitionRepository, StepStateRepository, SubmissionRepository};
use crate::services::roles::{Relationship, RoleResolver};
use crate::timeliness::classify_deadline;
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Whether a student may still submit
///
/// Only an overdue step under a locking governing deadline blocks.
pub fn submission_allowed(variant: PhaseVariant, governing: Option<&Deadline>) -> bool {
    !(variant == PhaseVariant::Overdue && governing.map_or(false, |d| d.lock_after_deadline))
}

/// Service deciding submission and approval actions
#[derive(Clone)]
pub struct ApprovalService {
    steps: Arc<StepDefinitionRepository>,
    deadlines: Arc<DeadlineRepository>,
    states: Arc<StepStateRepository>,
    submissions: Arc<SubmissionRepository>,
    roles: Arc<dyn RoleResolver>,
}

impl ApprovalService {
    /// Create a new approval service
    pub fn new(
        steps: Arc<StepDefinitionRepository>,
        deadlines: Arc<DeadlineRepository>,
        states: Arc<StepStateRepository>,
        submissions: Arc<SubmissionRepository>,
        roles: Arc<dyn RoleResolver>,
    ) -> Self {
        Self {
            steps,
            deadlines,
            states,
            submissions,
            roles,
        }
    }

    /// Whether the activity currently accepts submissions
    pub async fn can_submit(&self, activity_id: &str) -> Result<bool> {
        let state = self.load_state(activity_id).await?;
        self.submission_allowed_for(&state).await
    }

    /// Whether `actor` may approve work on the activity
    pub async fn can_approve(&self, activity_id: &str, actor: &str) -> Result<bool> {
        let state = self.load_state(activity_id).await?;
        if !self.submission_allowed_for(&state).await? {
            return Ok(false);
        }
        let relationship = self.roles.relationship(actor, activity_id).await?;
        Ok(relationship.is_staff())
    }

    /// Classify and store a submission
    pub async fn record_submission(
        &self,
        activity_id: &str,
        deadline_id: &str,
        kind: SubmissionKind,
        submitted_at: DateTime<Utc>,
    ) -> Result<Submission> {
        let state = self.load_state(activity_id).await?;
        if !self.submission_allowed_for(&state).await? {
            warn!(activity_id = %activity_id, "Submission refused, activity is locked");
            return Err(AcadflowError::SubmissionLocked {
                activity_id: activity_id.to_string(),
            });
        }

        let deadline = self
            .deadlines
            .find_by_id(deadline_id)
            .await?
            .ok_or_else(|| AcadflowError::NotFound(format!("Deadline not found: {}", deadline_id)))?;
        if deadline.related_to != state.workflow_type {
            return Err(AcadflowError::InvalidInput(format!(
                "Deadline {} governs {}, activity {} is {}",
                deadline_id, deadline.related_to, activity_id, state.workflow_type
            )));
        }

        // Classify the instant exactly as it will be stored
        let submitted_at = submitted_at.trunc_subsecs(3);
        let verdict = classify_deadline(submitted_at, &deadline)?;
        let submission = Submission::new(activity_id, deadline_id, kind, submitted_at, verdict);
        self.submissions.save(&submission).await?;

        info!(
            activity_id = %activity_id,
            deadline_id = %deadline_id,
            kind = %kind,
            verdict = %verdict,
            "Submission recorded"
        );
        Ok(submission)
    }

    /// Move an activity to any step of its workflow type on behalf of staff
    ///
    /// Clears the governing deadline, so a lock imposed by the engine is
    /// lifted even when the target is an overdue step.
    pub async fn staff_override(
        &self,
        activity_id: &str,
        step_key: &StepKey,
        actor: &str,
    ) -> Result<WorkflowStepState> {
        let state = self.load_state(activity_id).await?;

        let relationship = self.roles.relationship(actor, activity_id).await?;
        if !relationship.is_staff() {
            return Err(AcadflowError::Unauthorized {
                actor: actor.to_string(),
                action: "override",
                activity_id: activity_id.to_string(),
            });
        }

        if self
            .steps
            .find_by_key(state.workflow_type, step_key.as_str())
            .await?
            .is_none()
        {
            return Err(AcadflowError::NotFound(format!(
                "Step {} not found in {}",
                step_key, state.workflow_type
            )));
        }

        let updated = self
            .states
            .override_step(activity_id, step_key, actor, Utc::now())
            .await?;

        info!(
            activity_id = %activity_id,
            from_step = %state.current_step_key,
            to_step = %step_key,
            actor = %actor,
            relationship = %relationship,
            "Staff override applied"
        );
        Ok(updated)
    }

    /// Relationship of an actor to an activity
    pub async fn relationship(&self, actor: &str, activity_id: &str) -> Result<Relationship> {
        self.roles.relationship(actor, activity_id).await
    }

    async fn load_state(&self, activity_id: &str) -> Result<WorkflowStepState> {
        self.states
            .find(activity_id)
            .await?
            .ok_or_else(|| AcadflowError::NotFound(format!("Activity not found: {}", activity_id)))
    }

    async fn submission_allowed_for(&self, state: &WorkflowStepState) -> Result<bool> {
        let variant = self
            .steps
            .find_by_key(state.workflow_type, state.current_step_key.as_str())
            .await?
            .map(|step| step.phase_variant)
            .unwrap_or(PhaseVariant::Normal);

        if variant != PhaseVariant::Overdue {
            return Ok(true);
        }

        let governing = match &state.governing_deadline_id {
            Some(deadline_id) => self.deadlines.find_by_id(deadline_id).await?,
            None => None,
        };
        Ok(submission_allowed(variant, governing.as_ref()))
    }
}

impl std::fmt::Debug for ApprovalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkflowType;

    #[test]
    fn test_submission_allowed_truth_table() {
        let locking = Deadline::new("Final", WorkflowType::Internship, "2025", 1).with_lock(true);
        let lenient = Deadline::new("Final", WorkflowType::Internship, "2025", 1);

        assert!(!submission_allowed(PhaseVariant::Overdue, Some(&locking)));
        assert!(submission_allowed(PhaseVariant::Overdue, Some(&lenient)));
        assert!(submission_allowed(PhaseVariant::Overdue, None));
        assert!(submission_allowed(PhaseVariant::Late, Some(&locking)));
        assert!(submission_allowed(PhaseVariant::Normal, Some(&locking)));
    }
}
