//! Explicit (workflow type, phase key, variant) lookup
//!
//! Normal, late and overdue steps of one phase are siblings. The transition
//! engine moves an activity between siblings; a missing sibling is reported,
//! never papered over with a made-up step.

use crate::models::{PhaseVariant, StepDefinition, StepKey, WorkflowType};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SiblingLookupError {
    #[error("{workflow_type} phase '{phase_key}' has no {variant} step")]
    MissingSibling {
        workflow_type: WorkflowType,
        phase_key: String,
        variant: PhaseVariant,
    },
}

/// Step catalogue indexed by key and by phase variant
#[derive(Debug, Clone, Default)]
pub struct SiblingIndex {
    steps: Vec<StepDefinition>,
    by_key: HashMap<(WorkflowType, StepKey), usize>,
    by_phase: HashMap<(WorkflowType, String, PhaseVariant), usize>,
}

impl SiblingIndex {
    /// Build from step definitions of any number of workflow types
    ///
    /// If a (type, phase, variant) slot is claimed twice the lower-order step
    /// wins; validated step sets never contain such duplicates.
    pub fn build(steps: impl IntoIterator<Item = StepDefinition>) -> Self {
        let mut steps: Vec<StepDefinition> = steps.into_iter().collect();
        steps.sort_by(|a, b| {
            a.workflow_type
                .cmp(&b.workflow_type)
                .then(a.step_order.cmp(&b.step_order))
        });

        let mut by_key = HashMap::new();
        let mut by_phase = HashMap::new();
        for (idx, step) in steps.iter().enumerate() {
            by_key.insert((step.workflow_type, step.step_key.clone()), idx);
            by_phase
                .entry((step.workflow_type, step.phase_key.clone(), step.phase_variant))
                .or_insert(idx);
        }

        Self {
            steps,
            by_key,
            by_phase,
        }
    }

    pub fn step(&self, workflow_type: WorkflowType, step_key: &StepKey) -> Option<&StepDefinition> {
        self.by_key
            .get(&(workflow_type, step_key.clone()))
            .map(|&idx| &self.steps[idx])
    }

    /// Step of the given phase and variant
    pub fn sibling(
        &self,
        workflow_type: WorkflowType,
        phase_key: &str,
        variant: PhaseVariant,
    ) -> Result<&StepDefinition, SiblingLookupError> {
        self.by_phase
            .get(&(workflow_type, phase_key.to_string(), variant))
            .map(|&idx| &self.steps[idx])
            .ok_or_else(|| SiblingLookupError::MissingSibling {
                workflow_type,
                phase_key: phase_key.to_string(),
                variant,
            })
    }
}
