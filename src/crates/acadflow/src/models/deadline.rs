//! Deadline model

use super::WorkflowType;
use crate::timeliness::{ClassificationError, TimelinessWindow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cutoff for one academic period and workflow category
///
/// `deadline_at` is kept exactly as stored; it is resolved into an instant by
/// [`Deadline::window`] so that a broken row is reported rather than guessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
    /// Unique deadline identifier (UUID string)
    pub deadline_id: String,

    pub name: String,

    /// Workflow category the deadline governs
    pub related_to: WorkflowType,

    /// Restricts the deadline to activities currently in this phase
    pub phase_key: Option<String>,

    /// Academic year label, e.g. "2025"
    pub academic_year: String,

    pub semester: i64,

    /// RFC 3339 instant, or local date-time interpreted in `timezone`
    pub deadline_at: Option<String>,

    /// `UTC` or a fixed offset such as `+07:00`
    pub timezone: String,

    pub grace_period_minutes: i64,

    /// Informational only; never consulted by classification
    pub allow_late: bool,

    /// Past the effective deadline, submissions are OVERDUE rather than LATE
    pub lock_after_deadline: bool,

    /// Unpublished deadlines are not enforced
    pub is_published: bool,

    /// Creation timestamp (Unix timestamp)
    pub created_at: i64,

    /// Last update timestamp (Unix timestamp)
    pub updated_at: i64,
}

impl Deadline {
    /// Create a new unpublished deadline with no grace period
    pub fn new(
        name: impl Into<String>,
        related_to: WorkflowType,
        academic_year: impl Into<String>,
        semester: i64,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            deadline_id: Uuid::new_v4().to_string(),
            name: name.into(),
            related_to,
            phase_key: None,
            academic_year: academic_year.into(),
            semester,
            deadline_at: None,
            timezone: "UTC".to_string(),
            grace_period_minutes: 0,
            allow_late: true,
            lock_after_deadline: false,
            is_published: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: Set the formal deadline
    pub fn with_deadline_at(mut self, deadline_at: impl Into<String>) -> Self {
        self.deadline_at = Some(deadline_at.into());
        self
    }

    /// Builder: Set the timezone used for local deadline values
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Builder: Set the grace period
    pub fn with_grace_minutes(mut self, minutes: i64) -> Self {
        self.grace_period_minutes = minutes;
        self
    }

    /// Builder: Set the lock policy
    pub fn with_lock(mut self, lock_after_deadline: bool) -> Self {
        self.lock_after_deadline = lock_after_deadline;
        self
    }

    /// Builder: Set the informational allow-late flag
    pub fn with_allow_late(mut self, allow_late: bool) -> Self {
        self.allow_late = allow_late;
        self
    }

    /// Builder: Restrict to one phase
    pub fn with_phase_key(mut self, phase_key: impl Into<String>) -> Self {
        self.phase_key = Some(phase_key.into());
        self
    }

    /// Builder: Publish
    pub fn published(mut self) -> Self {
        self.is_published = true;
        self
    }

    /// Resolved enforcement window
    pub fn window(&self) -> Result<TimelinessWindow, ClassificationError> {
        TimelinessWindow::from_deadline(self)
    }

    /// Whether an activity in the given period and phase falls under this deadline
    pub fn governs(
        &self,
        workflow_type: WorkflowType,
        academic_year: &str,
        semester: i64,
        phase_key: &str,
    ) -> bool {
        self.related_to == workflow_type
            && self.academic_year == academic_year
            && self.semester == semester
            && self.phase_key.as_deref().map_or(true, |key| key == phase_key)
    }
}
