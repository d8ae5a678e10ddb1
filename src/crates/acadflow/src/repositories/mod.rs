//! Database repositories
//!
//! Provides repository patterns for database operations on step definitions,
//! deadlines, submissions, workflow step states, and engine run history.

pub mod deadline_repository;
pub mod engine_run_repository;
pub mod step_definition_repository;
pub mod step_state_repository;
pub mod submission_repository;

// Re-exports
pub use deadline_repository::DeadlineRepository;
pub use engine_run_repository::EngineRunRepository;
pub use step_definition_repository::{StepDefinitionRepository, StepUsage};
pub use step_state_repository::StepStateRepository;
pub use submission_repository::SubmissionRepository;
