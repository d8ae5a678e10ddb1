//! Engine run history

use crate::db::Database;
use crate::engine::RunSummary;
use crate::error::{AcadflowError, Result};
use sqlx::Row;
use std::sync::Arc;

/// Repository for persisted engine run summaries
#[derive(Clone, Debug)]
pub struct EngineRunRepository {
    db: Arc<Database>,
}

impl EngineRunRepository {
    /// Create a new engine run repository
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record a finished run
    pub async fn record(&self, summary: &RunSummary) -> Result<()> {
        let payload = serde_json::to_string(summary)?;

        sqlx::query(
            "INSERT INTO engine_runs (run_id, started_at, finished_at, deadlines_processed,
                                      activities_transitioned, activities_skipped, failures, summary)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&summary.run_id)
        .bind(summary.started_at.timestamp())
        .bind(summary.finished_at.timestamp())
        .bind(summary.deadlines_processed as i64)
        .bind(summary.activities_transitioned() as i64)
        .bind(summary.activities_skipped() as i64)
        .bind(summary.failures.len() as i64)
        .bind(payload)
        .execute(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to record engine run: {}", e)))?;

        Ok(())
    }

    /// Most recent runs, newest first
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<RunSummary>> {
        let rows = sqlx::query(
            "SELECT summary FROM engine_runs ORDER BY started_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| AcadflowError::Database(format!("Failed to list engine runs: {}", e)))?;

        rows.into_iter()
            .map(|row| {
                let payload: String = row.get("summary");
                serde_json::from_str(&payload).map_err(AcadflowError::from)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_record_and_list_recent() {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let repo = EngineRunRepository::new(db);

        let first = RunSummary::new(Utc::now());
        let mut second = RunSummary::new(Utc::now());
        second.deadlines_processed = 2;
        repo.record(&first).await.unwrap();
        repo.record(&second).await.unwrap();

        let recent = repo.list_recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].run_id, second.run_id);
        assert_eq!(recent[0].deadlines_processed, 2);

        assert_eq!(repo.list_recent(1).await.unwrap().len(), 1);
    }
}
