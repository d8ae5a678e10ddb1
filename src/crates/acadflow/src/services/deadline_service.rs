//! Deadline registry

use crate::error::{AcadflowError, Result};
use crate::models::Deadline;
use crate::repositories::DeadlineRepository;
use crate::timeliness::{ClassificationError, TimelinessWindow};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// A published deadline whose formal cutoff has passed
#[derive(Debug, Clone, PartialEq)]
pub struct DueDeadline {
    pub deadline: Deadline,
    pub window: TimelinessWindow,
}

/// Published deadlines split by whether they could be resolved
#[derive(Debug, Clone, Default)]
pub struct DueScan {
    pub due: Vec<DueDeadline>,
    /// Published but broken; never assumed due or not due
    pub unresolvable: Vec<(Deadline, ClassificationError)>,
}

/// Service for managing deadlines
#[derive(Clone, Debug)]
pub struct DeadlineService {
    repository: Arc<DeadlineRepository>,
}

impl DeadlineService {
    /// Create a new deadline service
    pub fn new(repository: Arc<DeadlineRepository>) -> Self {
        Self { repository }
    }

    /// Register a deadline
    ///
    /// A published deadline must resolve to an instant; a draft may still
    /// lack one.
    pub async fn create(&self, deadline: Deadline) -> Result<Deadline> {
        Self::check(&deadline)?;
        self.repository.save(&deadline).await?;
        info!(
            deadline_id = %deadline.deadline_id,
            name = %deadline.name,
            published = deadline.is_published,
            "Deadline created"
        );
        Ok(deadline)
    }

    /// Replace a deadline's fields
    pub async fn update(&self, mut deadline: Deadline) -> Result<Deadline> {
        Self::check(&deadline)?;
        deadline.updated_at = Utc::now().timestamp();
        self.repository.update(&deadline).await?;
        info!(deadline_id = %deadline.deadline_id, "Deadline updated");
        Ok(deadline)
    }

    /// Start enforcing a deadline
    pub async fn publish(&self, deadline_id: &str) -> Result<Deadline> {
        let mut deadline = self.get(deadline_id).await?;
        deadline.window()?;
        self.repository.set_published(deadline_id, true).await?;
        deadline.is_published = true;
        info!(deadline_id = %deadline_id, "Deadline published");
        Ok(deadline)
    }

    /// Stop enforcing a deadline
    pub async fn unpublish(&self, deadline_id: &str) -> Result<()> {
        self.repository.set_published(deadline_id, false).await?;
        info!(deadline_id = %deadline_id, "Deadline unpublished");
        Ok(())
    }

    pub async fn delete(&self, deadline_id: &str) -> Result<()> {
        self.repository.delete(deadline_id).await?;
        info!(deadline_id = %deadline_id, "Deadline deleted");
        Ok(())
    }

    pub async fn get(&self, deadline_id: &str) -> Result<Deadline> {
        self.repository
            .find_by_id(deadline_id)
            .await?
            .ok_or_else(|| AcadflowError::NotFound(format!("Deadline not found: {}", deadline_id)))
    }

    pub async fn list(&self) -> Result<Vec<Deadline>> {
        self.repository.list().await
    }

    pub async fn list_by_period(&self, academic_year: &str, semester: i64) -> Result<Vec<Deadline>> {
        self.repository.list_by_period(academic_year, semester).await
    }

    /// Published deadlines whose deadline has passed at `now`
    ///
    /// The effective deadline never precedes the formal one, so "formal or
    /// effective deadline passed" reduces to the formal deadline having
    /// passed.
    pub async fn list_due(&self, now: DateTime<Utc>) -> Result<DueScan> {
        let mut scan = DueScan::default();

        for deadline in self.repository.list_published().await? {
            match deadline.window() {
                Ok(window) if window.has_passed(now) => {
                    scan.due.push(DueDeadline { deadline, window });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        deadline_id = %deadline.deadline_id,
                        error = %e,
                        "Published deadline cannot be resolved"
                    );
                    scan.unresolvable.push((deadline, e));
                }
            }
        }

        Ok(scan)
    }

    fn check(deadline: &Deadline) -> Result<()> {
        if deadline.grace_period_minutes < 0 {
            return Err(AcadflowError::InvalidInput(format!(
                "Grace period must not be negative, got {} minutes",
                deadline.grace_period_minutes
            )));
        }
        if deadline.semester < 1 {
            return Err(AcadflowError::InvalidInput(format!(
                "Semester must be positive, got {}",
                deadline.semester
            )));
        }
        if deadline.is_published || deadline.deadline_at.is_some() {
            deadline.window()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::WorkflowType;
    use chrono::TimeZone;

    async fn setup() -> (DeadlineService, Arc<DeadlineRepository>) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let repository = Arc::new(DeadlineRepository::new(db));
        (DeadlineService::new(repository.clone()), repository)
    }

    fn proposal() -> Deadline {
        Deadline::new("Proposal", WorkflowType::ProjectPhase1, "2025", 2)
            .with_deadline_at("2026-03-15T23:59:59")
            .with_grace_minutes(2880)
    }

    #[tokio::test]
    async fn test_create_rejects_broken_deadline() {
        let (service, _) = setup().await;

        let err = service
            .create(proposal().with_deadline_at("next friday"))
            .await
            .unwrap_err();
        assert!(matches!(err, AcadflowError::Classification(_)));

        let err = service
            .create(Deadline::new("Draft", WorkflowType::Internship, "2025", 1).published())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AcadflowError::Classification(ClassificationError::MissingDeadline { .. })
        ));

        let err = service.create(proposal().with_grace_minutes(-1)).await.unwrap_err();
        assert!(matches!(err, AcadflowError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_draft_without_time_can_be_created_but_not_published() {
        let (service, _) = setup().await;
        let draft = service
            .create(Deadline::new("Draft", WorkflowType::Internship, "2025", 1))
            .await
            .unwrap();

        assert!(service.publish(&draft.deadline_id).await.is_err());
        assert!(!service.get(&draft.deadline_id).await.unwrap().is_published);
    }

    #[tokio::test]
    async fn test_list_due() {
        let (service, _) = setup().await;
        let passed = service.create(proposal().published()).await.unwrap();
        let future = service
            .create(
                Deadline::new("Final", WorkflowType::ProjectPhase1, "2025", 2)
                    .with_deadline_at("2026-06-30T23:59:59")
                    .published(),
            )
            .await
            .unwrap();
        service.create(proposal()).await.unwrap();

        let now = Utc.with_ymd_and_hms(2026, 3, 16, 0, 0, 0).unwrap();
        let scan = service.list_due(now).await.unwrap();
        assert_eq!(scan.due.len(), 1);
        assert_eq!(scan.due[0].deadline.deadline_id, passed.deadline_id);
        assert!(scan.unresolvable.is_empty());

        // the formal deadline instant itself is not yet past
        let at_deadline = Utc.with_ymd_and_hms(2026, 6, 30, 23, 59, 59).unwrap();
        let scan = service.list_due(at_deadline).await.unwrap();
        assert!(scan.due.iter().all(|d| d.deadline.deadline_id != future.deadline_id));
    }

    #[tokio::test]
    async fn test_list_due_reports_unresolvable_rows() {
        let (service, repository) = setup().await;
        let broken = proposal().with_deadline_at("garbage").published();
        repository.save(&broken).await.unwrap();

        let scan = service.list_due(Utc::now()).await.unwrap();
        assert!(scan.due.is_empty());
        assert_eq!(scan.unresolvable.len(), 1);
        assert_eq!(scan.unresolvable[0].0.deadline_id, broken.deadline_id);
    }

    #[tokio::test]
    async fn test_unpublish_and_delete() {
        let (service, _) = setup().await;
        let deadline = service.create(proposal().published()).await.unwrap();

        service.unpublish(&deadline.deadline_id).await.unwrap();
        assert!(!service.get(&deadline.deadline_id).await.unwrap().is_published);

        service.delete(&deadline.deadline_id).await.unwrap();
        assert!(service.get(&deadline.deadline_id).await.unwrap_err().is_not_found());
        assert!(service.list_by_period("2025", 2).await.unwrap().is_empty());
    }
}
