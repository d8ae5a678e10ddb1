//! Error types for acadflow
//!
//! Provides a unified error type for all acadflow operations. Step graph and
//! deadline parsing failures keep their own types so callers can match on the
//! offending step or deadline without string inspection.

use crate::graph::GraphError;
use crate::timeliness::ClassificationError;
use thiserror::Error;

/// Result type alias for acadflow operations
pub type Result<T> = std::result::Result<T, AcadflowError>;

/// Main error type for acadflow operations
#[derive(Debug, Error)]
pub enum AcadflowError {
    /// Step graph rejected by the dependency validator
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Deadline could not be resolved to an instant
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error with context
    #[error("Database error: {0}")]
    Database(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Step cannot be removed while activities sit on it
    #[error("Step {step_key} is in use by {active_count} active activities")]
    StepInUse { step_key: String, active_count: i64 },

    /// Submission refused because the activity is locked past its deadline
    #[error("Submissions are locked for activity {activity_id}")]
    SubmissionLocked { activity_id: String },

    /// Actor lacks the relationship required for the action
    #[error("Actor {actor} is not authorized to {action} activity {activity_id}")]
    Unauthorized {
        actor: String,
        action: &'static str,
        activity_id: String,
    },

    /// Invalid input supplied by a caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// SQL error
    #[error("SQL error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl AcadflowError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Graph error carried by this error, if any
    pub fn as_graph_error(&self) -> Option<&GraphError> {
        match self {
            Self::Graph(err) => Some(err),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for AcadflowError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphErrorKind;

    #[test]
    fn test_graph_error_is_transparent() {
        let err: AcadflowError =
            GraphError::new(GraphErrorKind::DuplicateOrder, "proposal").into();
        assert!(err.as_graph_error().is_some());
        assert!(err.to_string().contains("proposal"));
    }

    #[test]
    fn test_not_found_helper() {
        let err = AcadflowError::NotFound("activity a-1".to_string());
        assert!(err.is_not_found());
        assert!(!AcadflowError::Config("x".to_string()).is_not_found());
    }

    #[test]
    fn test_step_in_use_message() {
        let err = AcadflowError::StepInUse {
            step_key: "report".to_string(),
            active_count: 3,
        };
        assert_eq!(err.to_string(), "Step report is in use by 3 active activities");
    }
}
