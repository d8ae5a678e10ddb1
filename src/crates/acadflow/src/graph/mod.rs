//! Step dependency graph validation
//!
//! A step set is valid when every dependency points at an existing step of
//! the same workflow type with a strictly smaller order. That alone rules out
//! cycles. On top of it the first step must have no prerequisites and every
//! later step at least one.
//!
//! Every administrative change (create, update, delete, reorder) is applied
//! to an in-memory copy of the full step set and validated as a whole before
//! anything is written.

mod siblings;

pub use siblings::{SiblingIndex, SiblingLookupError};

use crate::models::{PhaseVariant, StepDefinition, StepKey, WorkflowType};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Rule broken by a step set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GraphErrorKind {
    /// A dependency does not precede its dependent
    CycleOrForwardReference,
    /// Two steps share an order
    DuplicateOrder,
    /// A dependency names no step of this workflow type
    OrphanDependency,
    /// First step has prerequisites, or a later step has none
    MissingInitialStepInvariant,
    /// A step lists itself as a dependency
    SelfReference,
    /// Two steps share a key
    DuplicateKey,
    /// Order is zero or negative
    InvalidOrder,
    /// Two steps share a phase key and variant
    DuplicateVariant,
    /// Update or delete names a step that does not exist
    UnknownStep,
}

impl GraphErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CycleOrForwardReference => "CycleOrForwardReference",
            Self::DuplicateOrder => "DuplicateOrder",
            Self::OrphanDependency => "OrphanDependency",
            Self::MissingInitialStepInvariant => "MissingInitialStepInvariant",
            Self::SelfReference => "SelfReference",
            Self::DuplicateKey => "DuplicateKey",
            Self::InvalidOrder => "InvalidOrder",
            Self::DuplicateVariant => "DuplicateVariant",
            Self::UnknownStep => "UnknownStep",
        }
    }
}

impl std::fmt::Display for GraphErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step graph rejection naming the offending step and rule
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind} at step '{offending_step_key}': {detail}")]
pub struct GraphError {
    pub kind: GraphErrorKind,
    pub offending_step_key: StepKey,
    pub detail: String,
}

impl GraphError {
    pub fn new(kind: GraphErrorKind, offending_step_key: impl Into<StepKey>) -> Self {
        Self {
            kind,
            offending_step_key: offending_step_key.into(),
            detail: String::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// One administrative edit of a workflow type's step set
#[derive(Debug, Clone)]
pub enum StepChange {
    Create(StepDefinition),
    /// Replaces the step with the same `step_id`
    Update(StepDefinition),
    Delete(StepKey),
    /// Complete list of the type's step keys in their new order
    Reorder(Vec<StepKey>),
}

/// Validate the complete step set of one workflow type
pub fn validate_step_graph(steps: &[StepDefinition]) -> Result<(), GraphError> {
    let Some(first) = steps.first() else {
        return Ok(());
    };
    let workflow_type = first.workflow_type;

    let mut ordered: Vec<&StepDefinition> = steps.iter().collect();
    ordered.sort_by(|a, b| {
        a.step_order
            .cmp(&b.step_order)
            .then_with(|| a.step_key.cmp(&b.step_key))
    });

    check_membership(&ordered, workflow_type)?;

    // (a) order uniqueness
    let mut seen_orders: HashMap<i64, &StepKey> = HashMap::new();
    for step in &ordered {
        if step.step_order <= 0 {
            return Err(GraphError::new(GraphErrorKind::InvalidOrder, step.step_key.clone())
                .with_detail(format!("order {} is not positive", step.step_order)));
        }
        if let Some(other) = seen_orders.insert(step.step_order, &step.step_key) {
            return Err(GraphError::new(GraphErrorKind::DuplicateOrder, step.step_key.clone())
                .with_detail(format!("order {} is already used by '{}'", step.step_order, other)));
        }
    }

    let order_of: HashMap<&str, i64> = ordered
        .iter()
        .map(|step| (step.step_key.as_str(), step.step_order))
        .collect();

    // (b) every dependency exists in this workflow type
    for step in &ordered {
        if let Some(missing) = step
            .dependencies
            .iter()
            .find(|dep| !order_of.contains_key(dep.as_str()))
        {
            return Err(GraphError::new(GraphErrorKind::OrphanDependency, step.step_key.clone())
                .with_detail(format!("depends on unknown step '{}'", missing)));
        }
    }

    // (c) dependencies precede their dependent; (d) no self-reference
    for step in &ordered {
        if step.depends_on(step.step_key.as_str()) {
            return Err(GraphError::new(GraphErrorKind::SelfReference, step.step_key.clone())
                .with_detail("step lists itself as a dependency"));
        }
        for dep in &step.dependencies {
            let dep_order = order_of.get(dep.as_str()).copied().unwrap_or(i64::MAX);
            if dep_order >= step.step_order {
                return Err(GraphError::new(
                    GraphErrorKind::CycleOrForwardReference,
                    step.step_key.clone(),
                )
                .with_detail(format!(
                    "depends on '{}' (order {}) which does not precede order {}",
                    dep, dep_order, step.step_order
                )));
            }
        }
    }

    // (e) only the first step may (and must) stand alone
    for (position, step) in ordered.iter().enumerate() {
        if position == 0 && !step.dependencies.is_empty() {
            return Err(GraphError::new(
                GraphErrorKind::MissingInitialStepInvariant,
                step.step_key.clone(),
            )
            .with_detail("first step must not have dependencies"));
        }
        if position > 0 && step.dependencies.is_empty() {
            return Err(GraphError::new(
                GraphErrorKind::MissingInitialStepInvariant,
                step.step_key.clone(),
            )
            .with_detail("only the first step may have no dependencies"));
        }
    }

    check_variants(&ordered)
}

fn check_membership(ordered: &[&StepDefinition], workflow_type: WorkflowType) -> Result<(), GraphError> {
    let mut seen_keys: HashSet<&str> = HashSet::new();
    for step in ordered {
        if step.workflow_type != workflow_type {
            return Err(GraphError::new(GraphErrorKind::OrphanDependency, step.step_key.clone())
                .with_detail(format!(
                    "belongs to {} but the set is {}",
                    step.workflow_type, workflow_type
                )));
        }
        if !seen_keys.insert(step.step_key.as_str()) {
            return Err(GraphError::new(GraphErrorKind::DuplicateKey, step.step_key.clone())
                .with_detail("step key is used more than once"));
        }
    }
    Ok(())
}

fn check_variants(ordered: &[&StepDefinition]) -> Result<(), GraphError> {
    let mut seen: HashMap<(&str, PhaseVariant), &StepKey> = HashMap::new();
    for step in ordered {
        if let Some(other) = seen.insert((step.phase_key.as_str(), step.phase_variant), &step.step_key) {
            return Err(GraphError::new(GraphErrorKind::DuplicateVariant, step.step_key.clone())
                .with_detail(format!(
                    "phase '{}' already has a {} step '{}'",
                    step.phase_key, step.phase_variant, other
                )));
        }
    }
    Ok(())
}

/// Apply a change to the current step set and validate the result
///
/// Returns the complete new step set; the input is never modified.
pub fn apply_change(
    current: &[StepDefinition],
    change: &StepChange,
) -> Result<Vec<StepDefinition>, GraphError> {
    let mut next: Vec<StepDefinition> = current.to_vec();

    match change {
        StepChange::Create(step) => {
            next.push(step.clone());
        }
        StepChange::Update(step) => {
            let slot = next
                .iter_mut()
                .find(|existing| existing.step_id == step.step_id)
                .ok_or_else(|| {
                    GraphError::new(GraphErrorKind::UnknownStep, step.step_key.clone())
                        .with_detail(format!("no step with id {}", step.step_id))
                })?;
            *slot = step.clone();
        }
        StepChange::Delete(key) => {
            let before = next.len();
            next.retain(|existing| &existing.step_key != key);
            if next.len() == before {
                return Err(GraphError::new(GraphErrorKind::UnknownStep, key.clone())
                    .with_detail("no such step"));
            }
        }
        StepChange::Reorder(order) => {
            next = reorder_steps(current, order)?;
        }
    }

    validate_step_graph(&next)?;
    Ok(next)
}

/// Assign order `i + 1` to the step at position `i` of `new_order`
///
/// `new_order` must name every existing step exactly once.
pub fn reorder_steps(
    current: &[StepDefinition],
    new_order: &[StepKey],
) -> Result<Vec<StepDefinition>, GraphError> {
    let mut by_key: HashMap<&str, &StepDefinition> = current
        .iter()
        .map(|step| (step.step_key.as_str(), step))
        .collect();

    let mut reordered = Vec::with_capacity(current.len());
    for (position, key) in new_order.iter().enumerate() {
        let step = match by_key.remove(key.as_str()) {
            Some(step) => step,
            None if current.iter().any(|s| &s.step_key == key) => {
                return Err(GraphError::new(GraphErrorKind::DuplicateOrder, key.clone())
                    .with_detail("step appears more than once in the new order"));
            }
            None => {
                return Err(GraphError::new(GraphErrorKind::OrphanDependency, key.clone())
                    .with_detail("new order names an unknown step"));
            }
        };
        let mut step = step.clone();
        step.step_order = position as i64 + 1;
        reordered.push(step);
    }

    if let Some(missing) = current.iter().find(|s| by_key.contains_key(s.step_key.as_str())) {
        return Err(GraphError::new(GraphErrorKind::OrphanDependency, missing.step_key.clone())
            .with_detail("step is missing from the new order"));
    }

    Ok(reordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(key: &str, order: i64, deps: &[&str]) -> StepDefinition {
        StepDefinition::new(WorkflowType::ProjectPhase1, key, order, key, key)
            .with_dependencies(deps.iter().copied())
    }

    fn kind_of(result: Result<(), GraphError>) -> GraphErrorKind {
        result.unwrap_err().kind
    }

    #[test]
    fn test_example_c_valid_chain() {
        let steps = vec![
            step("s1", 1, &[]),
            step("s2", 2, &["s1"]),
            step("s3", 3, &["s1", "s2"]),
        ];
        assert!(validate_step_graph(&steps).is_ok());
    }

    #[test]
    fn test_example_c_forward_reference_rejected() {
        let steps = vec![
            step("s1", 1, &["s2"]),
            step("s2", 2, &["s1"]),
        ];
        let err = validate_step_graph(&steps).unwrap_err();
        assert!(matches!(
            err.kind,
            GraphErrorKind::CycleOrForwardReference | GraphErrorKind::OrphanDependency
        ));
    }

    #[test]
    fn test_empty_set_is_valid() {
        assert!(validate_step_graph(&[]).is_ok());
    }

    #[test]
    fn test_duplicate_order() {
        let steps = vec![step("s1", 1, &[]), step("s2", 1, &["s1"])];
        let err = validate_step_graph(&steps).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::DuplicateOrder);
    }

    #[test]
    fn test_non_positive_order() {
        let steps = vec![step("s1", 0, &[])];
        assert_eq!(kind_of(validate_step_graph(&steps)), GraphErrorKind::InvalidOrder);
    }

    #[test]
    fn test_orphan_dependency_names_dependent() {
        let steps = vec![step("s1", 1, &[]), step("s2", 2, &["ghost"])];
        let err = validate_step_graph(&steps).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::OrphanDependency);
        assert_eq!(err.offending_step_key.as_str(), "s2");
        assert!(err.detail.contains("ghost"));
    }

    #[test]
    fn test_self_reference() {
        let steps = vec![step("s1", 1, &[]), step("s2", 2, &["s1", "s2"])];
        let err = validate_step_graph(&steps).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::SelfReference);
        assert_eq!(err.offending_step_key.as_str(), "s2");
    }

    #[test]
    fn test_first_step_must_stand_alone() {
        let steps = vec![step("s2", 2, &[]), step("s3", 3, &[])];
        let err = validate_step_graph(&steps).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::MissingInitialStepInvariant);
        assert_eq!(err.offending_step_key.as_str(), "s3");
    }

    #[test]
    fn test_duplicate_key() {
        let steps = vec![step("s1", 1, &[]), step("s1", 2, &[])];
        assert_eq!(kind_of(validate_step_graph(&steps)), GraphErrorKind::DuplicateKey);
    }

    #[test]
    fn test_mixed_workflow_types_rejected() {
        let foreign = StepDefinition::new(WorkflowType::Internship, "x", 2, "x", "x")
            .with_dependencies(["s1"]);
        let steps = vec![step("s1", 1, &[]), foreign];
        assert_eq!(kind_of(validate_step_graph(&steps)), GraphErrorKind::OrphanDependency);
    }

    #[test]
    fn test_duplicate_variant_in_phase() {
        let mut late_a = step("late_a", 2, &["s1"]).with_variant(PhaseVariant::Late);
        late_a.phase_key = "s1".to_string();
        let mut late_b = step("late_b", 3, &["s1"]).with_variant(PhaseVariant::Late);
        late_b.phase_key = "s1".to_string();
        let steps = vec![step("s1", 1, &[]), late_a, late_b];
        let err = validate_step_graph(&steps).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::DuplicateVariant);
        assert_eq!(err.offending_step_key.as_str(), "late_b");
    }

    #[test]
    fn test_reorder_assigns_positions() {
        let steps = vec![step("a", 1, &[]), step("b", 2, &["a"]), step("c", 3, &["a"])];
        let order: Vec<StepKey> = ["a", "c", "b"].into_iter().map(StepKey::from).collect();
        let next = apply_change(&steps, &StepChange::Reorder(order)).unwrap();
        let c = next.iter().find(|s| s.step_key.as_str() == "c").unwrap();
        let b = next.iter().find(|s| s.step_key.as_str() == "b").unwrap();
        assert_eq!(c.step_order, 2);
        assert_eq!(b.step_order, 3);
    }

    #[test]
    fn test_reorder_rejects_dependency_inversion() {
        let steps = vec![step("a", 1, &[]), step("b", 2, &["a"]), step("c", 3, &["b"])];
        let order: Vec<StepKey> = ["a", "c", "b"].into_iter().map(StepKey::from).collect();
        let err = apply_change(&steps, &StepChange::Reorder(order)).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::CycleOrForwardReference);
        assert_eq!(err.offending_step_key.as_str(), "c");
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let steps = vec![step("a", 1, &[]), step("b", 2, &["a"])];

        let missing: Vec<StepKey> = vec!["a".into()];
        let err = reorder_steps(&steps, &missing).unwrap_err();
        assert_eq!(err.offending_step_key.as_str(), "b");

        let unknown: Vec<StepKey> = vec!["a".into(), "b".into(), "z".into()];
        assert_eq!(reorder_steps(&steps, &unknown).unwrap_err().kind, GraphErrorKind::OrphanDependency);

        let repeated: Vec<StepKey> = vec!["a".into(), "a".into(), "b".into()];
        assert_eq!(reorder_steps(&steps, &repeated).unwrap_err().kind, GraphErrorKind::DuplicateOrder);
    }

    #[test]
    fn test_delete_with_dependents_fails() {
        let steps = vec![step("a", 1, &[]), step("b", 2, &["a"]), step("c", 3, &["b"])];
        let err = apply_change(&steps, &StepChange::Delete("b".into())).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::OrphanDependency);
        assert_eq!(err.offending_step_key.as_str(), "c");
    }

    #[test]
    fn test_delete_leaf_succeeds() {
        let steps = vec![step("a", 1, &[]), step("b", 2, &["a"])];
        let next = apply_change(&steps, &StepChange::Delete("b".into())).unwrap();
        assert_eq!(next.len(), 1);
    }

    #[test]
    fn test_update_unknown_step() {
        let steps = vec![step("a", 1, &[])];
        let err = apply_change(&steps, &StepChange::Update(step("z", 2, &["a"]))).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::UnknownStep);
    }

    #[test]
    fn test_update_introducing_forward_reference_fails() {
        let steps = vec![step("a", 1, &[]), step("b", 2, &["a"]), step("c", 3, &["a"])];
        let mut edited = steps[1].clone();
        edited.dependencies = ["c"].into_iter().map(StepKey::from).collect();
        let err = apply_change(&steps, &StepChange::Update(edited)).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::CycleOrForwardReference);
        assert_eq!(err.offending_step_key.as_str(), "b");
    }

    #[test]
    fn test_error_display_names_rule_and_step() {
        let err = GraphError::new(GraphErrorKind::DuplicateOrder, "proposal").with_detail("order 2");
        assert_eq!(err.to_string(), "DuplicateOrder at step 'proposal': order 2");
    }
}
