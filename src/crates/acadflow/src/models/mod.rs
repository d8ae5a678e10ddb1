//! Domain models for acadflow
//!
//! Step definitions, deadlines, submissions and per-activity step state.

pub mod deadline;
pub mod step_definition;
pub mod step_state;
pub mod submission;
pub mod workflow_type;

pub use deadline::Deadline;
pub use step_definition::{StepDefinition, StepKey};
pub use step_state::{StepTransition, WorkflowStepState, WriteOutcome, SYSTEM_ACTOR};
pub use submission::{Submission, SubmissionKind};
pub use workflow_type::{PhaseVariant, WorkflowType};
