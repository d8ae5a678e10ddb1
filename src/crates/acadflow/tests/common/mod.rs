//! Common test utilities and setup

#![allow(dead_code)]

use acadflow::config::EngineConfig;
use acadflow::db::Database;
use acadflow::models::{Deadline, PhaseVariant, StepDefinition, WorkflowType};
use acadflow::repositories::{
    DeadlineRepository, StepDefinitionRepository, StepStateRepository, SubmissionRepository,
};
use acadflow::services::{
    ApprovalService, DeadlineService, RoleResolver, StaticRoleResolver, StepService,
};
use acadflow::TransitionEngine;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

static TEST_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub const YEAR: &str = "2025";
pub const SEMESTER: i64 = 2;
pub const ADVISOR: &str = "dr-advisor";
pub const ADMIN: &str = "registrar";

/// Create a migrated file database with a unique name
pub async fn setup_test_db() -> (TempDir, Arc<Database>) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let db_path = temp_dir.path().join(format!("test_{}.db", counter));

    let db = Database::initialize(&db_path)
        .await
        .expect("Failed to create test database");

    (temp_dir, Arc::new(db))
}

/// Services wired over one test database
pub struct TestEnv {
    pub _temp_dir: TempDir,
    pub db: Arc<Database>,
    pub steps: StepService,
    pub deadlines: DeadlineService,
    pub states: Arc<StepStateRepository>,
    pub approvals: ApprovalService,
}

impl TestEnv {
    pub async fn new() -> Self {
        let (temp_dir, db) = setup_test_db().await;
        let step_repo = Arc::new(StepDefinitionRepository::new(db.clone()));
        let deadline_repo = Arc::new(DeadlineRepository::new(db.clone()));
        let states = Arc::new(StepStateRepository::new(db.clone()));
        let submissions = Arc::new(SubmissionRepository::new(db.clone()));

        let roles = StaticRoleResolver::new().with_administrator(ADMIN);

        Self {
            _temp_dir: temp_dir,
            steps: StepService::new(db.clone(), step_repo.clone(), states.clone()),
            deadlines: DeadlineService::new(deadline_repo.clone()),
            approvals: ApprovalService::new(
                step_repo,
                deadline_repo,
                states.clone(),
                submissions,
                Arc::new(roles),
            ),
            states,
            db,
        }
    }

    /// Approval service over the same database with different roles
    pub fn approvals_with(&self, roles: impl RoleResolver + 'static) -> ApprovalService {
        ApprovalService::new(
            Arc::new(StepDefinitionRepository::new(self.db.clone())),
            Arc::new(DeadlineRepository::new(self.db.clone())),
            self.states.clone(),
            Arc::new(SubmissionRepository::new(self.db.clone())),
            Arc::new(roles),
        )
    }

    pub fn engine(&self) -> TransitionEngine {
        self.engine_with(EngineConfig::default())
    }

    pub fn engine_with(&self, config: EngineConfig) -> TransitionEngine {
        TransitionEngine::new(self.db.clone(), config)
    }

    /// Internship catalogue: `apply`, then `report` with late and overdue
    /// siblings
    pub async fn seed_internship(&self) {
        for step in internship_steps() {
            self.steps.create_step(step).await.expect("Failed to seed step");
        }
    }

    /// Start an activity on the `report` step of the internship track
    pub async fn start_on_report(&self, activity_id: &str) {
        self.steps
            .start_activity(
                activity_id,
                WorkflowType::Internship,
                YEAR,
                SEMESTER,
                Some("report".into()),
            )
            .await
            .expect("Failed to start activity");
    }

    pub async fn current_step(&self, activity_id: &str) -> String {
        self.states
            .find(activity_id)
            .await
            .expect("Failed to load state")
            .expect("Activity missing")
            .current_step_key
            .to_string()
    }

    /// Create a published internship deadline
    pub async fn publish_deadline(&self, name: &str, at: &str, grace: i64, lock: bool) -> Deadline {
        self.deadlines
            .create(
                Deadline::new(name, WorkflowType::Internship, YEAR, SEMESTER)
                    .with_deadline_at(at)
                    .with_grace_minutes(grace)
                    .with_lock(lock)
                    .published(),
            )
            .await
            .expect("Failed to create deadline")
    }
}

pub fn internship_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new(WorkflowType::Internship, "apply", 1, "Apply", "apply"),
        StepDefinition::new(WorkflowType::Internship, "report", 2, "Final report", "report")
            .with_dependencies(["apply"]),
        StepDefinition::new(WorkflowType::Internship, "report_late", 3, "Final report (late)", "report")
            .with_variant(PhaseVariant::Late)
            .with_dependencies(["apply"]),
        StepDefinition::new(
            WorkflowType::Internship,
            "report_overdue",
            4,
            "Final report (overdue)",
            "report",
        )
        .with_variant(PhaseVariant::Overdue)
        .with_dependencies(["apply"]),
    ]
}

pub fn instant(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("Invalid test instant")
        .with_timezone(&Utc)
}
