//! Deadline repository for database operations

use crate::db::Database;
use crate::error::{AcadflowError, Result};
use crate::models::Deadline;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

const DEADLINE_COLUMNS: &str = "deadline_id, name, related_to, phase_key, academic_year, semester,
                                deadline_at, timezone, grace_period_minutes, allow_late,
                                lock_after_deadline, is_published, created_at, updated_at";

/// Repository for the deadline registry
#[derive(Clone, Debug)]
pub struct DeadlineRepository {
    db: Arc<Database>,
}

impl DeadlineRepository {
    /// Create a new deadline repository
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Save a new deadline
    pub async fn save(&self, deadline: &Deadline) -> Result<()> {
        sqlx::query(
            "INSERT INTO deadlines (deadline_id, name, related_to, phase_key, academic_year, semester,
                                    deadline_at, timezone, grace_period_minutes, allow_late,
                                    lock_after_deadline, is_published, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&deadline.deadline_id)
        .bind(&deadline.name)
        .bind(deadline.related_to.as_str())
        .bind(&deadline.phase_key)
        .bind(&deadline.academic_year)
        .bind(deadline.semester)
        .bind(&deadline.deadline_at)
        .bind(&deadline.timezone)
        .bind(deadline.grace_period_minutes)
        .bind(deadline.allow_late)
        .bind(deadline.lock_after_deadline)
        .bind(deadline.is_published)
        .bind(deadline.created_at)
        .bind(deadline.updated_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to save deadline: {}", e)))?;

        Ok(())
    }

    /// Update all mutable fields of a deadline
    pub async fn update(&self, deadline: &Deadline) -> Result<()> {
        let result = sqlx::query(
            "UPDATE deadlines
             SET name = ?, related_to = ?, phase_key = ?, academic_year = ?, semester = ?,
                 deadline_at = ?, timezone = ?, grace_period_minutes = ?, allow_late = ?,
                 lock_after_deadline = ?, is_published = ?, updated_at = ?
             WHERE deadline_id = ?",
        )
        .bind(&deadline.name)
        .bind(deadline.related_to.as_str())
        .bind(&deadline.phase_key)
        .bind(&deadline.academic_year)
        .bind(deadline.semester)
        .bind(&deadline.deadline_at)
        .bind(&deadline.timezone)
        .bind(deadline.grace_period_minutes)
        .bind(deadline.allow_late)
        .bind(deadline.lock_after_deadline)
        .bind(deadline.is_published)
        .bind(deadline.updated_at)
        .bind(&deadline.deadline_id)
        .execute(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to update deadline: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AcadflowError::NotFound(format!(
                "Deadline not found: {}",
                deadline.deadline_id
            )));
        }
        Ok(())
    }

    /// Load a deadline by ID
    pub async fn find_by_id(&self, deadline_id: &str) -> Result<Option<Deadline>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM deadlines WHERE deadline_id = ?",
            DEADLINE_COLUMNS
        ))
        .bind(deadline_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to load deadline: {}", e)))?;

        row.as_ref().map(deadline_from_row).transpose()
    }

    /// Set the published flag
    pub async fn set_published(&self, deadline_id: &str, published: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE deadlines SET is_published = ?, updated_at = ? WHERE deadline_id = ?",
        )
        .bind(published)
        .bind(Utc::now().timestamp())
        .bind(deadline_id)
        .execute(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to publish deadline: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AcadflowError::NotFound(format!("Deadline not found: {}", deadline_id)));
        }
        Ok(())
    }

    /// Delete a deadline
    pub async fn delete(&self, deadline_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM deadlines WHERE deadline_id = ?")
            .bind(deadline_id)
            .execute(self.db.pool())
            .await
            .map_err(|e| AcadflowError::Database(format!("Failed to delete deadline: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AcadflowError::NotFound(format!("Deadline not found: {}", deadline_id)));
        }
        Ok(())
    }

    /// All deadlines
    pub async fn list(&self) -> Result<Vec<Deadline>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM deadlines ORDER BY academic_year DESC, semester DESC, related_to ASC, name ASC",
            DEADLINE_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to list deadlines: {}", e)))?;

        rows.iter().map(deadline_from_row).collect()
    }

    /// Deadlines of one academic period
    pub async fn list_by_period(&self, academic_year: &str, semester: i64) -> Result<Vec<Deadline>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM deadlines
             WHERE academic_year = ? AND semester = ?
             ORDER BY related_to ASC, name ASC",
            DEADLINE_COLUMNS
        ))
        .bind(academic_year)
        .bind(semester)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to list deadlines: {}", e)))?;

        rows.iter().map(deadline_from_row).collect()
    }

    /// Published deadlines only
    pub async fn list_published(&self) -> Result<Vec<Deadline>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM deadlines WHERE is_published = 1 ORDER BY created_at ASC",
            DEADLINE_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to list deadlines: {}", e)))?;

        rows.iter().map(deadline_from_row).collect()
    }
}

fn deadline_from_row(row: &SqliteRow) -> Result<Deadline> {
    Ok(Deadline {
        deadline_id: row.get("deadline_id"),
        name: row.get("name"),
        related_to: row.get::<String, _>("related_to").parse()?,
        phase_key: row.get("phase_key"),
        academic_year: row.get("academic_year"),
        semester: row.get("semester"),
        deadline_at: row.get("deadline_at"),
        timezone: row.get("timezone"),
        grace_period_minutes: row.get("grace_period_minutes"),
        allow_late: row.get("allow_late"),
        lock_after_deadline: row.get("lock_after_deadline"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkflowType;

    async fn setup_test_db() -> Arc<Database> {
        Arc::new(Database::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let repo = DeadlineRepository::new(setup_test_db().await);
        let deadline = Deadline::new("Proposal", WorkflowType::ProjectPhase1, "2025", 2)
            .with_deadline_at("2026-03-15T23:59:59")
            .with_grace_minutes(2880)
            .with_phase_key("proposal");
        repo.save(&deadline).await.unwrap();

        let loaded = repo.find_by_id(&deadline.deadline_id).await.unwrap().unwrap();
        assert_eq!(loaded, deadline);
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_publish_and_list_published() {
        let repo = DeadlineRepository::new(setup_test_db().await);
        let a = Deadline::new("A", WorkflowType::Internship, "2025", 1);
        let b = Deadline::new("B", WorkflowType::Internship, "2025", 1);
        repo.save(&a).await.unwrap();
        repo.save(&b).await.unwrap();

        repo.set_published(&a.deadline_id, true).await.unwrap();
        let published = repo.list_published().await.unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].deadline_id, a.deadline_id);

        let err = repo.set_published("missing", true).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_period_and_delete() {
        let repo = DeadlineRepository::new(setup_test_db().await);
        let first = Deadline::new("A", WorkflowType::Internship, "2025", 1);
        let second = Deadline::new("B", WorkflowType::Internship, "2025", 2);
        repo.save(&first).await.unwrap();
        repo.save(&second).await.unwrap();

        assert_eq!(repo.list_by_period("2025", 1).await.unwrap().len(), 1);
        assert_eq!(repo.list().await.unwrap().len(), 2);

        repo.delete(&first.deadline_id).await.unwrap();
        assert!(repo.list_by_period("2025", 1).await.unwrap().is_empty());
        assert!(repo.delete(&first.deadline_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_negative_grace_rejected_by_schema() {
        let repo = DeadlineRepository::new(setup_test_db().await);
        let deadline = Deadline::new("Bad", WorkflowType::Internship, "2025", 1).with_grace_minutes(-5);
        assert!(repo.save(&deadline).await.is_err());
    }
}
