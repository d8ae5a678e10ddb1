//! # acadflow - Deadline-driven workflow tracking
//!
//! Tracks internships and special projects through per-type step graphs and
//! moves each activity to the late or overdue sibling of its current step
//! once a published deadline has passed.
//!
//! ## Features
//!
//! - **Step Graph Validation** - Every create, update, delete and reorder of a
//!   workflow type's steps is checked as a whole before it is committed
//! - **Timeliness Classification** - ON_TIME / LATE / OVERDUE against a
//!   deadline with grace period and lock policy
//! - **Transition Engine** - Periodic, idempotent, single-flight batch with
//!   per-unit failure isolation and a persisted run summary
//! - **Approval Gate** - Immediate `can_submit` / `can_approve` answers from
//!   current state
//! - **SQLite Database** - Persistent state stored in `~/.acadflow/acadflow.db`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use acadflow::{Database, EngineConfig, TransitionEngine};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let db = Arc::new(Database::initialize("acadflow.db").await?);
//! let engine = TransitionEngine::new(db, EngineConfig::default());
//!
//! let summary = engine.run_now().await;
//! println!("{} activities moved", summary.activities_transitioned());
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod graph;
pub mod health;
pub mod init;
pub mod models;
pub mod repositories;
pub mod services;
pub mod shutdown;
pub mod timeliness;
pub mod version;

// Error types and utilities
mod error;

// Re-export key types for convenience
pub use config::{load_config, AcadflowConfig, ConfigLoader, EngineConfig};
pub use db::{Database, WriteTransaction};
pub use engine::{RunSummary, Scheduler, TransitionEngine, TransitionSkipped};
pub use graph::{validate_step_graph, GraphError, GraphErrorKind, SiblingIndex};
pub use health::{ComponentHealth, HealthChecker, HealthReport, HealthStatus};
pub use models::{
    Deadline, PhaseVariant, StepDefinition, StepKey, Submission, SubmissionKind,
    WorkflowStepState, WorkflowType,
};
pub use services::{
    ApprovalService, DeadlineService, Relationship, RoleResolver, StaticRoleResolver,
    StepService,
};
pub use shutdown::ShutdownCoordinator;
pub use timeliness::{classify, ClassificationError, TimelinessWindow, Verdict};

// Error types
pub use error::{AcadflowError, Result};

// Version information
pub use version::{full_version as version_info, short_version};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert!(info.contains("acadflow"));
        assert!(short_version().starts_with('v'));
    }
}
