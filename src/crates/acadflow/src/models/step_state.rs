//! Per-activity workflow position

use super::{StepKey, WorkflowType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actor recorded for writes made by the transition engine
pub const SYSTEM_ACTOR: &str = "system";

/// Where a tracked activity currently sits in its workflow
///
/// Only the transition engine and explicit staff overrides write this row.
/// `version` grows by one on every write; a writer that observed an older
/// version must not overwrite the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepState {
    /// Tracked activity (internship or project) identifier
    pub activity_id: String,

    pub workflow_type: WorkflowType,

    pub academic_year: String,

    pub semester: i64,

    pub current_step_key: StepKey,

    /// When the activity entered its current step (Unix timestamp)
    pub entered_at: i64,

    /// Deadline that caused the last automatic transition
    pub governing_deadline_id: Option<String>,

    pub is_active: bool,

    pub version: i64,

    /// `system` for engine writes, otherwise the staff actor
    pub updated_by: String,
}

impl WorkflowStepState {
    /// Start tracking an activity at the given step
    pub fn new(
        activity_id: impl Into<String>,
        workflow_type: WorkflowType,
        academic_year: impl Into<String>,
        semester: i64,
        first_step: StepKey,
    ) -> Self {
        Self {
            activity_id: activity_id.into(),
            workflow_type,
            academic_year: academic_year.into(),
            semester,
            current_step_key: first_step,
            entered_at: Utc::now().timestamp(),
            governing_deadline_id: None,
            is_active: true,
            version: 1,
            updated_by: SYSTEM_ACTOR.to_string(),
        }
    }

    pub fn entered_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.entered_at, 0)
    }
}

/// Proposed automatic move of one activity
#[derive(Debug, Clone, PartialEq)]
pub struct StepTransition {
    pub activity_id: String,
    /// Version observed when the activity was loaded
    pub expected_version: i64,
    /// Step observed when the activity was loaded
    pub from_step: StepKey,
    pub to_step: StepKey,
    pub governing_deadline_id: String,
    pub entered_at: DateTime<Utc>,
}

/// Result of a conditional state write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied { new_version: i64 },
    /// The row changed since it was observed; nothing was written
    Conflict { current_version: i64, current_step: StepKey },
    /// The row disappeared or was deactivated
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_active_system_write() {
        let state = WorkflowStepState::new(
            "a-1",
            WorkflowType::Internship,
            "2025",
            1,
            StepKey::new("apply"),
        );
        assert!(state.is_active);
        assert_eq!(state.version, 1);
        assert_eq!(state.updated_by, SYSTEM_ACTOR);
        assert!(state.governing_deadline_id.is_none());
        assert!(state.entered_at_utc().is_some());
    }
}
