//! Submission repository for database operations

use crate::db::Database;
use crate::error::{AcadflowError, Result};
use crate::models::Submission;
use crate::timeliness::Verdict;
use chrono::DateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

/// Repository for recorded student submissions
#[derive(Clone, Debug)]
pub struct SubmissionRepository {
    db: Arc<Database>,
}

impl SubmissionRepository {
    /// Create a new submission repository
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Save a submission
    pub async fn save(&self, submission: &Submission) -> Result<()> {
        sqlx::query(
            "INSERT INTO submissions (submission_id, activity_id, deadline_id, kind, submitted_at, verdict)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&submission.submission_id)
        .bind(&submission.activity_id)
        .bind(&submission.deadline_id)
        .bind(submission.kind.as_str())
        .bind(submission.submitted_at.timestamp_millis())
        .bind(submission.verdict.as_str())
        .execute(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to save submission: {}", e)))?;

        Ok(())
    }

    /// Earliest submission of an activity against a deadline
    pub async fn earliest_for(&self, activity_id: &str, deadline_id: &str) -> Result<Option<Submission>> {
        let row = sqlx::query(
            "SELECT submission_id, activity_id, deadline_id, kind, submitted_at, verdict
             FROM submissions
             WHERE activity_id = ? AND deadline_id = ?
             ORDER BY submitted_at ASC
             LIMIT 1",
        )
        .bind(activity_id)
        .bind(deadline_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to load submission: {}", e)))?;

        row.as_ref().map(submission_from_row).transpose()
    }

    /// All submissions of an activity, oldest first
    pub async fn list_for_activity(&self, activity_id: &str) -> Result<Vec<Submission>> {
        let rows = sqlx::query(
            "SELECT submission_id, activity_id, deadline_id, kind, submitted_at, verdict
             FROM submissions
             WHERE activity_id = ?
             ORDER BY submitted_at ASC",
        )
        .bind(activity_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to list submissions: {}", e)))?;

        rows.iter().map(submission_from_row).collect()
    }
}

fn submission_from_row(row: &SqliteRow) -> Result<Submission> {
    let submitted_at_ms: i64 = row.get("submitted_at");
    let submitted_at = DateTime::from_timestamp_millis(submitted_at_ms).ok_or_else(|| {
        AcadflowError::Database(format!("Invalid submission timestamp: {}", submitted_at_ms))
    })?;

    Ok(Submission {
        submission_id: row.get("submission_id"),
        activity_id: row.get("activity_id"),
        deadline_id: row.get("deadline_id"),
        kind: row.get::<String, _>("kind").parse()?,
        submitted_at,
        verdict: Verdict::from_stored(&row.get::<String, _>("verdict")),
    })
}
