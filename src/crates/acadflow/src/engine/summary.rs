//! Per-run summary of the transition engine

use crate::models::{PhaseVariant, StepKey, WorkflowType};
use crate::timeliness::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why an activity was left where it was
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TransitionSkipped {
    /// The phase has no step of the target variant
    MissingSibling {
        activity_id: String,
        deadline_id: String,
        workflow_type: WorkflowType,
        phase_key: String,
        variant: PhaseVariant,
    },

    /// The activity sits on a step that is not in the catalogue
    UnknownCurrentStep {
        activity_id: String,
        workflow_type: WorkflowType,
        step_key: StepKey,
    },

    /// The row changed between observation and write
    ConcurrentChange {
        activity_id: String,
        deadline_id: String,
        observed_version: i64,
        current_version: i64,
    },

    /// The row was deactivated or removed before the write
    NoLongerActive {
        activity_id: String,
        deadline_id: String,
    },
}

impl TransitionSkipped {
    pub fn activity_id(&self) -> &str {
        match self {
            Self::MissingSibling { activity_id, .. }
            | Self::UnknownCurrentStep { activity_id, .. }
            | Self::ConcurrentChange { activity_id, .. }
            | Self::NoLongerActive { activity_id, .. } => activity_id,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingSibling { .. } => "missing_sibling",
            Self::UnknownCurrentStep { .. } => "unknown_current_step",
            Self::ConcurrentChange { .. } => "concurrent_change",
            Self::NoLongerActive { .. } => "no_longer_active",
        }
    }
}

/// A due deadline left out of the run because it could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDeadline {
    pub deadline_id: String,
    pub reason: String,
}

/// A committed automatic transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTransition {
    pub activity_id: String,
    pub deadline_id: String,
    pub from_step: StepKey,
    pub to_step: StepKey,
    pub verdict: Verdict,
    pub new_version: i64,
}

/// A unit that failed with an error; the rest of the batch carried on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub deadline_id: String,
    pub activity_id: Option<String>,
    pub error: String,
}

/// Outcome of one engine run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,

    /// Instant the run classified against
    pub evaluated_at: DateTime<Utc>,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    /// Another run was in flight; nothing was examined
    pub skipped_in_flight: bool,

    pub deadlines_processed: usize,

    pub activities_examined: usize,

    pub transitions: Vec<AppliedTransition>,

    pub skipped: Vec<TransitionSkipped>,

    pub skipped_deadlines: Vec<SkippedDeadline>,

    pub failures: Vec<UnitFailure>,
}

impl RunSummary {
    pub fn new(evaluated_at: DateTime<Utc>) -> Self {
        let started_at = Utc::now();
        Self {
            run_id: Uuid::new_v4().to_string(),
            evaluated_at,
            started_at,
            finished_at: started_at,
            skipped_in_flight: false,
            deadlines_processed: 0,
            activities_examined: 0,
            transitions: Vec::new(),
            skipped: Vec::new(),
            skipped_deadlines: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Summary of a run refused by the single-flight guard
    pub fn in_flight(evaluated_at: DateTime<Utc>) -> Self {
        let mut summary = Self::new(evaluated_at);
        summary.skipped_in_flight = true;
        summary
    }

    pub fn activities_transitioned(&self) -> usize {
        self.transitions.len()
    }

    pub fn activities_skipped(&self) -> usize {
        self.skipped.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Utc::now();
    }
}
