//! Workflow step state repository
//!
//! Every write bumps `version`. Automatic transitions are conditional on the
//! version and step observed by the caller; staff overrides are not.

use crate::db::Database;
use crate::error::{AcadflowError, Result};
use crate::models::{StepKey, StepTransition, WorkflowStepState, WorkflowType, WriteOutcome, SYSTEM_ACTOR};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::sync::Arc;
use tracing::debug;

const STATE_COLUMNS: &str = "activity_id, workflow_type, academic_year, semester, current_step_key,
                             entered_at, governing_deadline_id, is_active, version, updated_by";

/// Repository for per-activity workflow positions
#[derive(Clone, Debug)]
pub struct StepStateRepository {
    db: Arc<Database>,
}

impl StepStateRepository {
    /// Create a new step state repository
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Start tracking an activity
    pub async fn start(&self, state: &WorkflowStepState) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO workflow_step_states (activity_id, workflow_type, academic_year, semester,
                                               current_step_key, entered_at, governing_deadline_id,
                                               is_active, version, updated_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (activity_id) DO NOTHING",
        )
        .bind(&state.activity_id)
        .bind(state.workflow_type.as_str())
        .bind(&state.academic_year)
        .bind(state.semester)
        .bind(state.current_step_key.as_str())
        .bind(state.entered_at)
        .bind(&state.governing_deadline_id)
        .bind(state.is_active)
        .bind(state.version)
        .bind(&state.updated_by)
        .execute(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to start activity: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AcadflowError::InvalidInput(format!(
                "Activity {} is already tracked",
                state.activity_id
            )));
        }
        Ok(())
    }

    /// Load the state of an activity
    pub async fn find(&self, activity_id: &str) -> Result<Option<WorkflowStepState>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM workflow_step_states WHERE activity_id = ?",
            STATE_COLUMNS
        ))
        .bind(activity_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to load activity state: {}", e)))?;

        row.as_ref().map(state_from_row).transpose()
    }

    /// Active activities of one workflow type and academic period
    pub async fn list_active_in_category(
        &self,
        workflow_type: WorkflowType,
        academic_year: &str,
        semester: i64,
    ) -> Result<Vec<WorkflowStepState>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM workflow_step_states
             WHERE workflow_type = ? AND academic_year = ? AND semester = ? AND is_active = 1
             ORDER BY activity_id ASC",
            STATE_COLUMNS
        ))
        .bind(workflow_type.as_str())
        .bind(academic_year)
        .bind(semester)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to list activity states: {}", e)))?;

        rows.iter().map(state_from_row).collect()
    }

    /// All tracked activities, optionally of one workflow type
    pub async fn list(&self, workflow_type: Option<WorkflowType>) -> Result<Vec<WorkflowStepState>> {
        let rows = match workflow_type {
            Some(wt) => {
                sqlx::query(&format!(
                    "SELECT {} FROM workflow_step_states WHERE workflow_type = ? ORDER BY activity_id ASC",
                    STATE_COLUMNS
                ))
                .bind(wt.as_str())
                .fetch_all(self.db.pool())
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM workflow_step_states ORDER BY workflow_type ASC, activity_id ASC",
                    STATE_COLUMNS
                ))
                .fetch_all(self.db.pool())
                .await
            }
        }
        .map_err(|e| AcadflowError::Database(format!("Failed to list activity states: {}", e)))?;

        rows.iter().map(state_from_row).collect()
    }

    /// Apply an automatic transition if the row still matches what was observed
    ///
    /// The row is re-read inside an immediate transaction, so a staff
    /// override committed after the observation always wins.
    pub async fn transition_if_unchanged(&self, transition: &StepTransition) -> Result<WriteOutcome> {
        let mut tx = self.db.begin_write().await?;

        let row = sqlx::query(
            "SELECT version, current_step_key, is_active FROM workflow_step_states WHERE activity_id = ?",
        )
        .bind(&transition.activity_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to re-read activity state: {}", e)))?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(WriteOutcome::Missing);
        };

        let is_active: bool = row.get("is_active");
        let current_version: i64 = row.get("version");
        let current_step = StepKey::new(row.get::<String, _>("current_step_key"));

        if !is_active {
            tx.rollback().await?;
            return Ok(WriteOutcome::Missing);
        }
        if current_version != transition.expected_version || current_step != transition.from_step {
            tx.rollback().await?;
            debug!(
                activity_id = %transition.activity_id,
                observed_version = transition.expected_version,
                current_version,
                "Activity changed since it was observed"
            );
            return Ok(WriteOutcome::Conflict {
                current_version,
                current_step,
            });
        }

        sqlx::query(
            "UPDATE workflow_step_states
             SET current_step_key = ?, entered_at = ?, governing_deadline_id = ?,
                 version = version + 1, updated_by = ?
             WHERE activity_id = ? AND version = ?",
        )
        .bind(transition.to_step.as_str())
        .bind(transition.entered_at.timestamp())
        .bind(&transition.governing_deadline_id)
        .bind(SYSTEM_ACTOR)
        .bind(&transition.activity_id)
        .bind(transition.expected_version)
        .execute(&mut *tx)
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to write transition: {}", e)))?;

        tx.commit().await?;

        Ok(WriteOutcome::Applied {
            new_version: transition.expected_version + 1,
        })
    }

    /// Unconditionally move an activity to a step on behalf of staff
    pub async fn override_step(
        &self,
        activity_id: &str,
        step_key: &StepKey,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<WorkflowStepState> {
        let mut tx = self.db.begin_write().await?;

        let result = sqlx::query(
            "UPDATE workflow_step_states
             SET current_step_key = ?, entered_at = ?, governing_deadline_id = NULL,
                 version = version + 1, updated_by = ?
             WHERE activity_id = ?",
        )
        .bind(step_key.as_str())
        .bind(now.timestamp())
        .bind(actor)
        .bind(activity_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to override step: {}", e)))?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AcadflowError::NotFound(format!("Activity not found: {}", activity_id)));
        }

        let row = sqlx::query(&format!(
            "SELECT {} FROM workflow_step_states WHERE activity_id = ?",
            STATE_COLUMNS
        ))
        .bind(activity_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to load activity state: {}", e)))?;
        let state = state_from_row(&row)?;

        tx.commit().await?;
        Ok(state)
    }

    /// Stop tracking an activity; the row is kept for history
    pub async fn deactivate(&self, activity_id: &str, actor: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE workflow_step_states
             SET is_active = 0, version = version + 1, updated_by = ?
             WHERE activity_id = ? AND is_active = 1",
        )
        .bind(actor)
        .bind(activity_id)
        .execute(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to deactivate activity: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AcadflowError::NotFound(format!(
                "Active activity not found: {}",
                activity_id
            )));
        }
        Ok(())
    }

    /// Active activities currently at a step, on a transaction connection
    pub async fn count_active_at_step_in(
        &self,
        conn: &mut SqliteConnection,
        workflow_type: WorkflowType,
        step_key: &str,
    ) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM workflow_step_states
             WHERE workflow_type = ? AND current_step_key = ? AND is_active = 1",
        )
        .bind(workflow_type.as_str())
        .bind(step_key)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to count activities: {}", e)))?;

        Ok(row.get("count"))
    }
}

fn state_from_row(row: &SqliteRow) -> Result<WorkflowStepState> {
    Ok(WorkflowStepState {
        activity_id: row.get("activity_id"),
        workflow_type: row.get::<String, _>("workflow_type").parse()?,
        academic_year: row.get("academic_year"),
        semester: row.get("semester"),
        current_step_key: StepKey::new(row.get::<String, _>("current_step_key")),
        entered_at: row.get("entered_at"),
        governing_deadline_id: row.get("governing_deadline_id"),
        is_active: row.get("is_active"),
        version: row.get("version"),
        updated_by: row.get("updated_by"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (Arc<Database>, StepStateRepository) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let repo = StepStateRepository::new(db.clone());
        (db, repo)
    }

    fn tracked(activity_id: &str) -> WorkflowStepState {
        WorkflowStepState::new(activity_id, WorkflowType::ProjectPhase1, "2025", 2, StepKey::new("proposal"))
    }

    fn to_late(state: &WorkflowStepState) -> StepTransition {
        StepTransition {
            activity_id: state.activity_id.clone(),
            expected_version: state.version,
            from_step: state.current_step_key.clone(),
            to_step: StepKey::new("proposal_late"),
            governing_deadline_id: "d-1".to_string(),
            entered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_start_and_find() {
        let (_db, repo) = setup().await;
        let state = tracked("a-1");
        repo.start(&state).await.unwrap();

        let loaded = repo.find("a-1").await.unwrap().unwrap();
        assert_eq!(loaded, state);

        let err = repo.start(&state).await.unwrap_err();
        assert!(matches!(err, AcadflowError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_transition_applies_when_unchanged() {
        let (_db, repo) = setup().await;
        let state = tracked("a-1");
        repo.start(&state).await.unwrap();

        let outcome = repo.transition_if_unchanged(&to_late(&state)).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Applied { new_version: 2 });

        let loaded = repo.find("a-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_step_key.as_str(), "proposal_late");
        assert_eq!(loaded.governing_deadline_id.as_deref(), Some("d-1"));
        assert_eq!(loaded.updated_by, SYSTEM_ACTOR);
    }

    #[tokio::test]
    async fn test_override_after_observation_wins() {
        let (_db, repo) = setup().await;
        let state = tracked("a-1");
        repo.start(&state).await.unwrap();
        let transition = to_late(&state);

        let overridden = repo
            .override_step("a-1", &StepKey::new("register"), "dr.advisor", Utc::now())
            .await
            .unwrap();
        assert_eq!(overridden.version, 2);
        assert!(overridden.governing_deadline_id.is_none());

        let outcome = repo.transition_if_unchanged(&transition).await.unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Conflict {
                current_version: 2,
                current_step: StepKey::new("register"),
            }
        );
        let loaded = repo.find("a-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_step_key.as_str(), "register");
        assert_eq!(loaded.updated_by, "dr.advisor");
    }

    #[tokio::test]
    async fn test_inactive_or_missing_rows_are_not_written() {
        let (_db, repo) = setup().await;
        let state = tracked("a-1");
        repo.start(&state).await.unwrap();
        let transition = to_late(&state);

        repo.deactivate("a-1", "registrar").await.unwrap();
        assert_eq!(repo.transition_if_unchanged(&transition).await.unwrap(), WriteOutcome::Missing);

        let mut ghost = transition.clone();
        ghost.activity_id = "ghost".to_string();
        assert_eq!(repo.transition_if_unchanged(&ghost).await.unwrap(), WriteOutcome::Missing);
        assert!(repo.deactivate("a-1", "registrar").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_category_listing_and_step_count() {
        let (db, repo) = setup().await;
        repo.start(&tracked("a-1")).await.unwrap();
        repo.start(&tracked("a-2")).await.unwrap();
        repo.start(&WorkflowStepState::new(
            "a-3",
            WorkflowType::ProjectPhase1,
            "2025",
            1,
            StepKey::new("proposal"),
        ))
        .await
        .unwrap();

        let listed = repo
            .list_active_in_category(WorkflowType::ProjectPhase1, "2025", 2)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(repo.list(None).await.unwrap().len(), 3);
        assert!(repo.list(Some(WorkflowType::Internship)).await.unwrap().is_empty());

        let mut tx = db.begin_write().await.unwrap();
        let count = repo
            .count_active_at_step_in(&mut tx, WorkflowType::ProjectPhase1, "proposal")
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(count, 3);
    }
}
