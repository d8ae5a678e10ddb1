//! Service layer
//!
//! Step administration, the deadline registry, and the submission/approval
//! gate, built on the repositories.

pub mod approval_service;
pub mod deadline_service;
pub mod roles;
pub mod step_service;

pub use approval_service::{submission_allowed, ApprovalService};
pub use deadline_service::{DeadlineService, DueDeadline, DueScan};
pub use roles::{Relationship, RoleResolver, StaticRoleResolver};
pub use step_service::StepService;
