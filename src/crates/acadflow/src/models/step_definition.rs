//! Step definition model

use super::{PhaseVariant, WorkflowType};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Unique code of a step within its workflow type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepKey(String);

impl StepKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StepKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for StepKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StepKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StepKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One stage in a workflow type
///
/// Dependencies name other steps of the same workflow type by key. The set
/// is only trusted after the whole step set of the type has passed
/// [`crate::graph::validate_step_graph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Unique step identifier (UUID string)
    pub step_id: String,

    pub workflow_type: WorkflowType,

    pub step_key: StepKey,

    /// Position within the workflow type (1-based, unique per type)
    pub step_order: i64,

    pub title: String,

    /// Description shown to students; may contain template placeholders
    pub description_template: String,

    /// Logical stage shared by the normal/late/overdue siblings
    pub phase_key: String,

    pub phase_variant: PhaseVariant,

    /// Prerequisite steps
    pub dependencies: BTreeSet<StepKey>,

    pub is_required: bool,

    /// Creation timestamp (Unix timestamp)
    pub created_at: i64,

    /// Last update timestamp (Unix timestamp)
    pub updated_at: i64,
}

impl StepDefinition {
    /// Create a new normal-variant step with no dependencies
    pub fn new(
        workflow_type: WorkflowType,
        step_key: impl Into<StepKey>,
        step_order: i64,
        title: impl Into<String>,
        phase_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            step_id: Uuid::new_v4().to_string(),
            workflow_type,
            step_key: step_key.into(),
            step_order,
            title: title.into(),
            description_template: String::new(),
            phase_key: phase_key.into(),
            phase_variant: PhaseVariant::Normal,
            dependencies: BTreeSet::new(),
            is_required: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: Set dependencies
    pub fn with_dependencies<I, K>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<StepKey>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: Set phase variant
    pub fn with_variant(mut self, variant: PhaseVariant) -> Self {
        self.phase_variant = variant;
        self
    }

    /// Builder: Set description template
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description_template = description.into();
        self
    }

    /// Builder: Mark step as optional
    pub fn optional(mut self) -> Self {
        self.is_required = false;
        self
    }

    pub fn depends_on(&self, key: &str) -> bool {
        self.dependencies.contains(key)
    }

    /// Dependencies as the JSON array stored in the database
    pub fn dependencies_json(&self) -> String {
        serde_json::to_string(&self.dependencies).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_step_defaults() {
        let step = StepDefinition::new(WorkflowType::Internship, "apply", 1, "Apply", "apply");
        assert_eq!(step.phase_variant, PhaseVariant::Normal);
        assert!(step.dependencies.is_empty());
        assert!(step.is_required);
        assert_eq!(step.created_at, step.updated_at);
    }

    #[test]
    fn test_dependencies_are_deduplicated_and_sorted() {
        let step = StepDefinition::new(WorkflowType::ProjectPhase1, "defense", 3, "Defense", "defense")
            .with_dependencies(["proposal", "advisor", "proposal"]);
        assert_eq!(step.dependencies.len(), 2);
        assert_eq!(step.dependencies_json(), r#"["advisor","proposal"]"#);
        assert!(step.depends_on("advisor"));
        assert!(!step.depends_on("defense"));
    }
}
