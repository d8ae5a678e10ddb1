//! Deadline-driven workflow state transitions
//!
//! A run loads every published deadline that has passed, finds the active
//! activities it governs that still sit on a `normal` step, classifies each
//! against the deadline and moves it to the matching `late` or `overdue`
//! sibling step. Runs are idempotent: a moved activity is no longer on a
//! `normal` step, so a second run leaves it alone.
//!
//! Every deadline x activity unit is isolated. A unit that fails is logged
//! and counted; the batch carries on, and a run itself never fails.

mod scheduler;
mod summary;

pub use scheduler::Scheduler;
pub use summary::{AppliedTransition, RunSummary, SkippedDeadline, TransitionSkipped, UnitFailure};

use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::Result;
use crate::graph::{SiblingIndex, SiblingLookupError};
use crate::models::{
    Deadline, PhaseVariant, StepDefinition, StepTransition, WorkflowStepState, WriteOutcome,
};
use crate::repositories::{
    DeadlineRepository, EngineRunRepository, StepDefinitionRepository, StepStateRepository,
    SubmissionRepository,
};
use crate::services::{DeadlineService, DueDeadline};
use crate::timeliness::{classify, TimelinessWindow, Verdict};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Result of one deadline x activity unit
#[derive(Debug)]
enum UnitOutcome {
    Unchanged,
    Transitioned(AppliedTransition),
    Skipped(TransitionSkipped),
}

/// Shared read handles for unit tasks
#[derive(Clone)]
struct UnitContext {
    submissions: Arc<SubmissionRepository>,
    states: Arc<StepStateRepository>,
    siblings: Arc<SiblingIndex>,
}

/// The periodic transition agent
pub struct TransitionEngine {
    steps: Arc<StepDefinitionRepository>,
    deadlines: Arc<DeadlineService>,
    submissions: Arc<SubmissionRepository>,
    states: Arc<StepStateRepository>,
    runs: Arc<EngineRunRepository>,
    config: EngineConfig,
    in_flight: Mutex<()>,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for TransitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionEngine")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight.try_lock().is_err())
            .finish()
    }
}

impl TransitionEngine {
    /// Create an engine over a database
    pub fn new(db: Arc<Database>, config: EngineConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_parallel_units.max(1)));
        Self {
            steps: Arc::new(StepDefinitionRepository::new(db.clone())),
            deadlines: Arc::new(DeadlineService::new(Arc::new(DeadlineRepository::new(db.clone())))),
            submissions: Arc::new(SubmissionRepository::new(db.clone())),
            states: Arc::new(StepStateRepository::new(db.clone())),
            runs: Arc::new(EngineRunRepository::new(db)),
            config,
            in_flight: Mutex::new(()),
            permits,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run against the current time
    pub async fn run_now(&self) -> RunSummary {
        self.run_at(Utc::now()).await
    }

    /// Run as if the current time were `now`
    ///
    /// Returns immediately with `skipped_in_flight` set when another run
    /// holds the single-flight guard.
    pub async fn run_at(&self, now: DateTime<Utc>) -> RunSummary {
        let Ok(_guard) = self.in_flight.try_lock() else {
            info!("Transition run already in flight, skipping");
            return RunSummary::in_flight(now);
        };

        let mut summary = RunSummary::new(now);
        info!(run_id = %summary.run_id, evaluated_at = %now, "Transition run started");

        if let Err(e) = self.execute(now, &mut summary).await {
            error!(run_id = %summary.run_id, error = %e, "Transition run aborted");
            summary.failures.push(UnitFailure {
                deadline_id: String::new(),
                activity_id: None,
                error: e.to_string(),
            });
        }
        summary.finish();

        info!(
            run_id = %summary.run_id,
            deadlines_processed = summary.deadlines_processed,
            activities_examined = summary.activities_examined,
            transitioned = summary.activities_transitioned(),
            skipped = summary.activities_skipped(),
            failures = summary.failures.len(),
            "Transition run finished"
        );

        if self.config.record_runs {
            if let Err(e) = self.runs.record(&summary).await {
                warn!(run_id = %summary.run_id, error = %e, "Failed to record run summary");
            }
        }

        summary
    }

    async fn execute(&self, now: DateTime<Utc>, summary: &mut RunSummary) -> Result<()> {
        let siblings = Arc::new(SiblingIndex::build(self.steps.list_all().await?));
        let scan = self.deadlines.list_due(now).await?;

        for (deadline, err) in scan.unresolvable {
            warn!(
                deadline_id = %deadline.deadline_id,
                name = %deadline.name,
                error = %err,
                "Skipping deadline with unresolvable time"
            );
            summary.skipped_deadlines.push(SkippedDeadline {
                deadline_id: deadline.deadline_id,
                reason: err.to_string(),
            });
        }

        let ctx = UnitContext {
            submissions: self.submissions.clone(),
            states: self.states.clone(),
            siblings,
        };

        // Deadlines run one after another so a later deadline sees the
        // transitions of an earlier one; units of one deadline run in parallel.
        for due in scan.due {
            let deadline_id = due.deadline.deadline_id.clone();
            match self.process_deadline(&ctx, due, now, summary).await {
                Ok(()) => summary.deadlines_processed += 1,
                Err(e) => {
                    error!(deadline_id = %deadline_id, error = %e, "Failed to process deadline");
                    summary.failures.push(UnitFailure {
                        deadline_id,
                        activity_id: None,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    async fn process_deadline(
        &self,
        ctx: &UnitContext,
        due: DueDeadline,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let deadline = Arc::new(due.deadline);
        let states = self
            .states
            .list_active_in_category(deadline.related_to, &deadline.academic_year, deadline.semester)
            .await?;

        debug!(
            deadline_id = %deadline.deadline_id,
            candidates = states.len(),
            "Processing due deadline"
        );

        let mut units = JoinSet::new();
        for state in states {
            let Some(current) = ctx.siblings.step(state.workflow_type, &state.current_step_key) else {
                warn!(
                    activity_id = %state.activity_id,
                    step_key = %state.current_step_key,
                    "Activity sits on a step missing from the catalogue"
                );
                summary.skipped.push(TransitionSkipped::UnknownCurrentStep {
                    activity_id: state.activity_id,
                    workflow_type: state.workflow_type,
                    step_key: state.current_step_key,
                });
                continue;
            };

            if !deadline.governs(
                state.workflow_type,
                &state.academic_year,
                state.semester,
                &current.phase_key,
            ) || !self.is_candidate_variant(current.phase_variant)
            {
                continue;
            }

            summary.activities_examined += 1;
            let current = current.clone();
            let ctx = ctx.clone();
            let deadline = deadline.clone();
            let window = due.window;
            let permits = self.permits.clone();
            let activity_id = state.activity_id.clone();

            units.spawn(async move {
                // never closed, so a permit is always granted
                let _permit = permits.acquire_owned().await.ok();
                let outcome = process_unit(&ctx, state, current, &deadline, window, now).await;
                (activity_id, outcome)
            });
        }

        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((_, Ok(UnitOutcome::Unchanged))) => {}
                Ok((_, Ok(UnitOutcome::Transitioned(applied)))) => summary.transitions.push(applied),
                Ok((_, Ok(UnitOutcome::Skipped(skipped)))) => summary.skipped.push(skipped),
                Ok((activity_id, Err(e))) => {
                    error!(
                        deadline_id = %deadline.deadline_id,
                        activity_id = %activity_id,
                        error = %e,
                        "Transition unit failed"
                    );
                    summary.failures.push(UnitFailure {
                        deadline_id: deadline.deadline_id.clone(),
                        activity_id: Some(activity_id),
                        error: e.to_string(),
                    });
                }
                Err(join_err) => {
                    error!(
                        deadline_id = %deadline.deadline_id,
                        error = %join_err,
                        "Transition unit panicked"
                    );
                    summary.failures.push(UnitFailure {
                        deadline_id: deadline.deadline_id.clone(),
                        activity_id: None,
                        error: join_err.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn is_candidate_variant(&self, variant: PhaseVariant) -> bool {
        match variant {
            PhaseVariant::Normal => true,
            PhaseVariant::Late => self.config.escalate_late,
            PhaseVariant::Overdue => false,
        }
    }
}

/// Variant an activity should move to for a verdict, if any
///
/// Never points back towards `normal`.
pub fn target_variant(current: PhaseVariant, verdict: Verdict) -> Option<PhaseVariant> {
    let target = match verdict {
        Verdict::OnTime => return None,
        Verdict::Late => PhaseVariant::Late,
        Verdict::Overdue => PhaseVariant::Overdue,
    };
    (target.rank() > current.rank()).then_some(target)
}

async fn process_unit(
    ctx: &UnitContext,
    state: WorkflowStepState,
    current: StepDefinition,
    deadline: &Deadline,
    window: TimelinessWindow,
    now: DateTime<Utc>,
) -> Result<UnitOutcome> {
    let classified_at = match ctx
        .submissions
        .earliest_for(&state.activity_id, &deadline.deadline_id)
        .await?
    {
        Some(submission) => submission.submitted_at,
        None => now,
    };
    let verdict = classify(classified_at, &window);

    let Some(variant) = target_variant(current.phase_variant, verdict) else {
        return Ok(UnitOutcome::Unchanged);
    };

    let target = match ctx
        .siblings
        .sibling(current.workflow_type, &current.phase_key, variant)
    {
        Ok(target) => target,
        Err(SiblingLookupError::MissingSibling { workflow_type, phase_key, variant }) => {
            warn!(
                activity_id = %state.activity_id,
                deadline_id = %deadline.deadline_id,
                workflow_type = %workflow_type,
                phase_key = %phase_key,
                variant = %variant,
                "No sibling step for verdict, leaving activity in place"
            );
            return Ok(UnitOutcome::Skipped(TransitionSkipped::MissingSibling {
                activity_id: state.activity_id,
                deadline_id: deadline.deadline_id.clone(),
                workflow_type,
                phase_key,
                variant,
            }));
        }
    };

    let transition = StepTransition {
        activity_id: state.activity_id.clone(),
        expected_version: state.version,
        from_step: state.current_step_key.clone(),
        to_step: target.step_key.clone(),
        governing_deadline_id: deadline.deadline_id.clone(),
        entered_at: now,
    };

    match ctx.states.transition_if_unchanged(&transition).await? {
        WriteOutcome::Applied { new_version } => {
            info!(
                activity_id = %transition.activity_id,
                deadline_id = %deadline.deadline_id,
                from_step = %transition.from_step,
                to_step = %transition.to_step,
                verdict = %verdict,
                "Activity transitioned"
            );
            Ok(UnitOutcome::Transitioned(AppliedTransition {
                activity_id: transition.activity_id,
                deadline_id: transition.governing_deadline_id,
                from_step: transition.from_step,
                to_step: transition.to_step,
                verdict,
                new_version,
            }))
        }
        WriteOutcome::Conflict { current_version, current_step } => {
            info!(
                activity_id = %transition.activity_id,
                observed_version = transition.expected_version,
                current_version,
                current_step = %current_step,
                "Activity changed concurrently, skipping automatic transition"
            );
            Ok(UnitOutcome::Skipped(TransitionSkipped::ConcurrentChange {
                activity_id: transition.activity_id,
                deadline_id: transition.governing_deadline_id,
                observed_version: transition.expected_version,
                current_version,
            }))
        }
        WriteOutcome::Missing => Ok(UnitOutcome::Skipped(TransitionSkipped::NoLongerActive {
            activity_id: transition.activity_id,
            deadline_id: transition.governing_deadline_id,
        })),
    }
}
