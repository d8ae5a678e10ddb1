//! Administrative operations on the step catalogue
//!
//! Every change loads the full step set of its workflow type inside one
//! write transaction, applies the change in memory, validates the whole
//! graph and only then writes. A rejected change leaves the store untouched.

use crate::db::Database;
use crate::error::{AcadflowError, Result};
use crate::graph::{self, StepChange};
use crate::models::{PhaseVariant, StepDefinition, StepKey, WorkflowStepState, WorkflowType};
use crate::repositories::{StepDefinitionRepository, StepStateRepository, StepUsage};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Service for creating, editing, reordering and deleting steps
#[derive(Clone, Debug)]
pub struct StepService {
    db: Arc<Database>,
    steps: Arc<StepDefinitionRepository>,
    states: Arc<StepStateRepository>,
}

impl StepService {
    /// Create a new step service
    pub fn new(
        db: Arc<Database>,
        steps: Arc<StepDefinitionRepository>,
        states: Arc<StepStateRepository>,
    ) -> Self {
        Self { db, steps, states }
    }

    /// Add a step to its workflow type
    pub async fn create_step(&self, step: StepDefinition) -> Result<StepDefinition> {
        let workflow_type = step.workflow_type;
        let step_key = step.step_key.clone();
        let next = self
            .commit_change(workflow_type, StepChange::Create(step))
            .await?;
        info!(workflow_type = %workflow_type, step_key = %step_key, "Step created");
        find_in(next, &step_key)
    }

    /// Replace an existing step, matched by step id
    pub async fn update_step(&self, mut step: StepDefinition) -> Result<StepDefinition> {
        step.updated_at = Utc::now().timestamp();
        let workflow_type = step.workflow_type;
        let step_key = step.step_key.clone();
        let next = self
            .commit_change(workflow_type, StepChange::Update(step))
            .await?;
        info!(workflow_type = %workflow_type, step_key = %step_key, "Step updated");
        find_in(next, &step_key)
    }

    /// Remove a step
    ///
    /// Fails with `StepInUse` while active activities sit on the step, and
    /// with an orphan-dependency graph error while other steps depend on it.
    pub async fn delete_step(&self, workflow_type: WorkflowType, step_key: &StepKey) -> Result<()> {
        self.commit_change(workflow_type, StepChange::Delete(step_key.clone()))
            .await?;
        info!(workflow_type = %workflow_type, step_key = %step_key, "Step deleted");
        Ok(())
    }

    /// Renumber all steps of a type to follow `new_order`
    pub async fn reorder(
        &self,
        workflow_type: WorkflowType,
        new_order: Vec<StepKey>,
    ) -> Result<Vec<StepDefinition>> {
        let next = self
            .commit_change(workflow_type, StepChange::Reorder(new_order))
            .await?;
        info!(workflow_type = %workflow_type, steps = next.len(), "Steps reordered");
        Ok(next)
    }

    /// Steps of a workflow type in order
    pub async fn list(&self, workflow_type: WorkflowType) -> Result<Vec<StepDefinition>> {
        self.steps.list_by_type(workflow_type).await
    }

    /// Active activity counts per step
    pub async fn usage(&self, workflow_type: WorkflowType) -> Result<Vec<StepUsage>> {
        self.steps.usage_counts(workflow_type).await
    }

    /// Start tracking an activity on the first step of its workflow type
    ///
    /// The first step is the lowest-ordered `normal` step; an explicit
    /// `step_key` must name a step of the type.
    pub async fn start_activity(
        &self,
        activity_id: &str,
        workflow_type: WorkflowType,
        academic_year: &str,
        semester: i64,
        step_key: Option<StepKey>,
    ) -> Result<WorkflowStepState> {
        let steps = self.steps.list_by_type(workflow_type).await?;
        let start = match step_key {
            Some(key) => steps.into_iter().find(|step| step.step_key == key).ok_or_else(|| {
                AcadflowError::NotFound(format!("Step {} not found in {}", key, workflow_type))
            })?,
            None => steps
                .into_iter()
                .find(|step| step.phase_variant == PhaseVariant::Normal)
                .ok_or_else(|| {
                    AcadflowError::InvalidInput(format!("No steps defined for {}", workflow_type))
                })?,
        };

        let state = WorkflowStepState::new(
            activity_id,
            workflow_type,
            academic_year,
            semester,
            start.step_key,
        );
        self.states.start(&state).await?;

        info!(
            activity_id = %activity_id,
            workflow_type = %workflow_type,
            step_key = %state.current_step_key,
            "Activity tracking started"
        );
        Ok(state)
    }

    async fn commit_change(
        &self,
        workflow_type: WorkflowType,
        change: StepChange,
    ) -> Result<Vec<StepDefinition>> {
        let mut tx = self.db.begin_write().await?;

        let staged = match self.stage_change(&mut tx, workflow_type, &change).await {
            Ok(staged) => staged,
            Err(e) => {
                tx.rollback().await?;
                warn!(workflow_type = %workflow_type, error = %e, "Step change rejected");
                return Err(e);
            }
        };

        self.steps
            .replace_type_set(&mut tx, workflow_type, &staged)
            .await?;
        tx.commit().await?;
        Ok(staged)
    }

    async fn stage_change(
        &self,
        conn: &mut sqlx::SqliteConnection,
        workflow_type: WorkflowType,
        change: &StepChange,
    ) -> Result<Vec<StepDefinition>> {
        let current = self.steps.list_by_type_in(conn, workflow_type).await?;

        match change {
            StepChange::Delete(step_key) => {
                self.ensure_unused(conn, workflow_type, step_key).await?;
            }
            // Activities are tracked by key and variant; neither may shift under them
            StepChange::Update(step) => {
                if let Some(old) = current.iter().find(|old| old.step_id == step.step_id) {
                    if old.step_key != step.step_key
                        || old.phase_key != step.phase_key
                        || old.phase_variant != step.phase_variant
                    {
                        self.ensure_unused(conn, workflow_type, &old.step_key).await?;
                    }
                }
            }
            StepChange::Create(_) | StepChange::Reorder(_) => {}
        }

        let mut next = graph::apply_change(&current, change)?;

        if let StepChange::Reorder(_) = change {
            let now = Utc::now().timestamp();
            for step in next.iter_mut() {
                let moved = current
                    .iter()
                    .find(|old| old.step_id == step.step_id)
                    .map_or(true, |old| old.step_order != step.step_order);
                if moved {
                    step.updated_at = now;
                }
            }
        }

        next.sort_by_key(|step| step.step_order);
        Ok(next)
    }

    async fn ensure_unused(
        &self,
        conn: &mut sqlx::SqliteConnection,
        workflow_type: WorkflowType,
        step_key: &StepKey,
    ) -> Result<()> {
        let active_count = self
            .states
            .count_active_at_step_in(conn, workflow_type, step_key.as_str())
            .await?;
        if active_count > 0 {
            return Err(AcadflowError::StepInUse {
                step_key: step_key.to_string(),
                active_count,
            });
        }
        Ok(())
    }
}

fn find_in(steps: Vec<StepDefinition>, step_key: &StepKey) -> Result<StepDefinition> {
    steps
        .into_iter()
        .find(|step| &step.step_key == step_key)
        .ok_or_else(|| AcadflowError::NotFound(format!("Step not found: {}", step_key)))
}
