//! Workflow tracks and step timeliness variants

use crate::error::AcadflowError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Top-level activity track with its own step sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkflowType {
    /// Internship
    #[serde(rename = "internship")]
    Internship,
    /// Special project, phase 1
    #[serde(rename = "project1")]
    ProjectPhase1,
    /// Special project, phase 2
    #[serde(rename = "project2")]
    ProjectPhase2,
}

impl WorkflowType {
    pub const ALL: [WorkflowType; 3] = [Self::Internship, Self::ProjectPhase1, Self::ProjectPhase2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internship => "internship",
            Self::ProjectPhase1 => "project1",
            Self::ProjectPhase2 => "project2",
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkflowType {
    type Err = AcadflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internship" => Ok(Self::Internship),
            "project1" | "project-phase-1" => Ok(Self::ProjectPhase1),
            "project2" | "project-phase-2" => Ok(Self::ProjectPhase2),
            other => Err(AcadflowError::InvalidInput(format!(
                "Unknown workflow type '{}'. Expected internship, project1 or project2",
                other
            ))),
        }
    }
}

/// Timeliness flavour of a step within its phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseVariant {
    Normal,
    Late,
    Overdue,
}

impl PhaseVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Late => "late",
            Self::Overdue => "overdue",
        }
    }

    /// Severity rank; automatic transitions only ever move to a higher rank
    pub fn rank(&self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Late => 1,
            Self::Overdue => 2,
        }
    }
}

impl std::fmt::Display for PhaseVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PhaseVariant {
    type Err = AcadflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "late" => Ok(Self::Late),
            "overdue" => Ok(Self::Overdue),
            other => Err(AcadflowError::InvalidInput(format!(
                "Unknown phase variant '{}'",
                other
            ))),
        }
    }
}
