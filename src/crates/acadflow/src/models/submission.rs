//! Student submission model

use crate::error::AcadflowError;
use crate::timeliness::Verdict;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Kind of student action tied to a deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Document,
    DefenseRequest,
    TestRequest,
}

impl SubmissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::DefenseRequest => "defense_request",
            Self::TestRequest => "test_request",
        }
    }
}

impl std::fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubmissionKind {
    type Err = AcadflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(Self::Document),
            "defense_request" => Ok(Self::DefenseRequest),
            "test_request" => Ok(Self::TestRequest),
            other => Err(AcadflowError::InvalidInput(format!(
                "Unknown submission kind '{}'",
                other
            ))),
        }
    }
}

/// Timestamped student action against a deadline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Unique submission identifier (UUID string)
    pub submission_id: String,

    pub activity_id: String,

    pub deadline_id: String,

    pub kind: SubmissionKind,

    /// Submission instant, kept at full precision
    pub submitted_at: DateTime<Utc>,

    /// Verdict at the time the submission was recorded
    pub verdict: Verdict,
}

impl Submission {
    /// `submitted_at` is truncated to whole milliseconds, the stored precision
    pub fn new(
        activity_id: impl Into<String>,
        deadline_id: impl Into<String>,
        kind: SubmissionKind,
        submitted_at: DateTime<Utc>,
        verdict: Verdict,
    ) -> Self {
        Self {
            submission_id: Uuid::new_v4().to_string(),
            activity_id: activity_id.into(),
            deadline_id: deadline_id.into(),
            kind,
            submitted_at: submitted_at.trunc_subsecs(3),
            verdict,
        }
    }
}
