//! Configuration helpers for CLI
//!
//! Loads the layered configuration, opens the database and hands out the
//! services each command needs.

use crate::config::{AcadflowConfig, ConfigLoader};
use crate::db::Database;
use crate::engine::TransitionEngine;
use crate::error::Result;
use crate::init;
use crate::repositories::{
    DeadlineRepository, EngineRunRepository, StepDefinitionRepository, StepStateRepository,
    SubmissionRepository,
};
use crate::services::{ApprovalService, DeadlineService, StaticRoleResolver, StepService};
use std::sync::Arc;
use tracing::info;

/// Everything a command handler needs
#[derive(Clone, Debug)]
pub struct CliContext {
    pub config: AcadflowConfig,
    pub db: Arc<Database>,
}

impl CliContext {
    /// Load configuration and open the configured database
    pub async fn load() -> Result<Self> {
        info!("Loading configuration");
        let config = ConfigLoader::new()?.load().await?;
        Self::open(config).await
    }

    /// Open the database named by an already loaded configuration
    pub async fn open(config: AcadflowConfig) -> Result<Self> {
        let db_path = config.database_path()?;
        info!(path = %db_path.display(), "Opening database");

        let db = Database::with_max_connections(&db_path, config.database.max_connections).await?;
        db.run_migrations().await?;

        Ok(Self {
            config,
            db: Arc::new(db),
        })
    }

    /// Wrap an existing database
    pub fn with_database(config: AcadflowConfig, db: Arc<Database>) -> Self {
        Self { config, db }
    }

    pub fn step_service(&self) -> StepService {
        StepService::new(
            self.db.clone(),
            Arc::new(StepDefinitionRepository::new(self.db.clone())),
            Arc::new(StepStateRepository::new(self.db.clone())),
        )
    }

    pub fn deadline_service(&self) -> DeadlineService {
        DeadlineService::new(Arc::new(DeadlineRepository::new(self.db.clone())))
    }

    /// Approval service whose only staff are the configured administrators
    pub fn approval_service(&self) -> ApprovalService {
        let roles = self
            .config
            .roles
            .administrators
            .iter()
            .fold(StaticRoleResolver::new(), |roles, admin| {
                roles.with_administrator(admin.clone())
            });

        ApprovalService::new(
            Arc::new(StepDefinitionRepository::new(self.db.clone())),
            Arc::new(DeadlineRepository::new(self.db.clone())),
            Arc::new(StepStateRepository::new(self.db.clone())),
            Arc::new(SubmissionRepository::new(self.db.clone())),
            Arc::new(roles),
        )
    }

    pub fn engine(&self) -> TransitionEngine {
        TransitionEngine::new(self.db.clone(), self.config.engine.clone())
    }

    pub fn steps(&self) -> StepDefinitionRepository {
        StepDefinitionRepository::new(self.db.clone())
    }

    pub fn states(&self) -> StepStateRepository {
        StepStateRepository::new(self.db.clone())
    }

    pub fn submissions(&self) -> SubmissionRepository {
        SubmissionRepository::new(self.db.clone())
    }

    pub fn runs(&self) -> EngineRunRepository {
        EngineRunRepository::new(self.db.clone())
    }
}

/// Check if acadflow is initialized
///
/// Returns true if the user configuration file exists
pub fn is_initialized() -> bool {
    init::acadflow_home()
        .map(|home| home.join(init::CONFIG_FILE).exists())
        .unwrap_or(false)
}

/// Get initialization instructions
pub fn get_init_instructions() -> String {
    "acadflow is not initialized. Run 'acadflow init' to get started.".to_string()
}
