//! Step definition repository for database operations

use crate::db::Database;
use crate::error::{AcadflowError, Result};
use crate::models::{StepDefinition, StepKey, WorkflowType};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::collections::BTreeSet;
use std::sync::Arc;

const STEP_COLUMNS: &str = "step_id, workflow_type, step_key, step_order, title, description_template,
                            phase_key, phase_variant, dependencies, is_required, created_at, updated_at";

/// Number of active activities currently sitting on a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepUsage {
    pub step_key: StepKey,
    pub step_order: i64,
    pub active_count: i64,
}

/// Repository for the step catalogue
///
/// Reads that feed a validate-then-write sequence take the open
/// [`crate::db::WriteTransaction`] connection so the whole sequence sees one
/// snapshot.
#[derive(Clone, Debug)]
pub struct StepDefinitionRepository {
    db: Arc<Database>,
}

impl StepDefinitionRepository {
    /// Create a new step definition repository
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// All steps of a workflow type, ordered by step order
    pub async fn list_by_type(&self, workflow_type: WorkflowType) -> Result<Vec<StepDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM step_definitions WHERE workflow_type = ? ORDER BY step_order ASC",
            STEP_COLUMNS
        ))
        .bind(workflow_type.as_str())
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to list steps: {}", e)))?;

        rows.iter().map(step_from_row).collect()
    }

    /// Same as [`Self::list_by_type`] on a transaction connection
    pub async fn list_by_type_in(
        &self,
        conn: &mut SqliteConnection,
        workflow_type: WorkflowType,
    ) -> Result<Vec<StepDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM step_definitions WHERE workflow_type = ? ORDER BY step_order ASC",
            STEP_COLUMNS
        ))
        .bind(workflow_type.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to list steps: {}", e)))?;

        rows.iter().map(step_from_row).collect()
    }

    /// Every step of every workflow type
    pub async fn list_all(&self) -> Result<Vec<StepDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM step_definitions ORDER BY workflow_type ASC, step_order ASC",
            STEP_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to list steps: {}", e)))?;

        rows.iter().map(step_from_row).collect()
    }

    /// Load one step by key
    pub async fn find_by_key(
        &self,
        workflow_type: WorkflowType,
        step_key: &str,
    ) -> Result<Option<StepDefinition>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM step_definitions WHERE workflow_type = ? AND step_key = ?",
            STEP_COLUMNS
        ))
        .bind(workflow_type.as_str())
        .bind(step_key)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to load step: {}", e)))?;

        row.as_ref().map(step_from_row).transpose()
    }

    /// Replace the stored step set of a workflow type
    ///
    /// Callers validate `steps` first; this only writes.
    pub async fn replace_type_set(
        &self,
        conn: &mut SqliteConnection,
        workflow_type: WorkflowType,
        steps: &[StepDefinition],
    ) -> Result<()> {
        sqlx::query("DELETE FROM step_definitions WHERE workflow_type = ?")
            .bind(workflow_type.as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| AcadflowError::Database(format!("Failed to clear steps: {}", e)))?;

        for step in steps {
            sqlx::query(
                "INSERT INTO step_definitions (step_id, workflow_type, step_key, step_order, title,
                                               description_template, phase_key, phase_variant,
                                               dependencies, is_required, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&step.step_id)
            .bind(step.workflow_type.as_str())
            .bind(step.step_key.as_str())
            .bind(step.step_order)
            .bind(&step.title)
            .bind(&step.description_template)
            .bind(&step.phase_key)
            .bind(step.phase_variant.as_str())
            .bind(step.dependencies_json())
            .bind(step.is_required)
            .bind(step.created_at)
            .bind(step.updated_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AcadflowError::Database(format!("Failed to save step {}: {}", step.step_key, e))
            })?;
        }

        Ok(())
    }

    /// Active activities per step of a workflow type, in step order
    pub async fn usage_counts(&self, workflow_type: WorkflowType) -> Result<Vec<StepUsage>> {
        let rows = sqlx::query(
            "SELECT d.step_key AS step_key, d.step_order AS step_order,
                    COUNT(s.activity_id) AS active_count
             FROM step_definitions d
             LEFT JOIN workflow_step_states s
                    ON s.workflow_type = d.workflow_type
                   AND s.current_step_key = d.step_key
                   AND s.is_active = 1
             WHERE d.workflow_type = ?
             GROUP BY d.step_key, d.step_order
             ORDER BY d.step_order ASC",
        )
        .bind(workflow_type.as_str())
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to count step usage: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| StepUsage {
                step_key: StepKey::new(row.get::<String, _>("step_key")),
                step_order: row.get("step_order"),
                active_count: row.get("active_count"),
            })
            .collect())
    }
}

fn step_from_row(row: &SqliteRow) -> Result<StepDefinition> {
    let step_key: String = row.get("step_key");
    let dependencies: String = row.get("dependencies");
    let dependencies: BTreeSet<StepKey> = serde_json::from_str(&dependencies).map_err(|e| {
        AcadflowError::Database(format!(
            "Step {} has malformed dependencies '{}': {}",
            step_key, dependencies, e
        ))
    })?;

    Ok(StepDefinition {
        step_id: row.get("step_id"),
        workflow_type: row.get::<String, _>("workflow_type").parse()?,
        step_key: StepKey::new(step_key),
        step_order: row.get("step_order"),
        title: row.get("title"),
        description_template: row.get("description_template"),
        phase_key: row.get("phase_key"),
        phase_variant: row.get::<String, _>("phase_variant").parse()?,
        dependencies,
        is_required: row.get("is_required"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
