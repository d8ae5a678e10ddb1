//! Health check functionality
//!
//! Verifies the database is reachable, every workflow type's stored step set
//! still forms a valid graph, and every published deadline resolves to an
//! instant.

use crate::config::AcadflowConfig;
use crate::db::Database;
use crate::graph::validate_step_graph;
use crate::models::WorkflowType;
use crate::repositories::{DeadlineRepository, StepDefinitionRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All checks passed
    Healthy,
    /// Some checks failed but the system is partially operational
    Degraded,
    /// Critical checks failed, the system is not operational
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Individual component check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Check status
    pub status: HealthStatus,
    /// Human-readable message
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

impl ComponentHealth {
    /// Create a healthy component check
    pub fn healthy(name: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: Some("OK".to_string()),
            response_time_ms,
        }
    }

    /// Create a degraded component check
    pub fn degraded(name: impl Into<String>, message: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            response_time_ms,
        }
    }

    /// Create an unhealthy component check
    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            response_time_ms,
        }
    }
}

/// Overall system health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status
    pub status: HealthStatus,
    /// Individual component checks
    pub checks: Vec<ComponentHealth>,
    /// Total response time in milliseconds
    pub total_response_time_ms: u64,
    /// Timestamp of the check
    pub timestamp: i64,
}

impl HealthReport {
    /// Create a new health report from component checks
    pub fn new(checks: Vec<ComponentHealth>) -> Self {
        let status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let total_response_time_ms = checks.iter().map(|c| c.response_time_ms).sum();
        let timestamp = chrono::Utc::now().timestamp();

        Self {
            status,
            checks,
            total_response_time_ms,
            timestamp,
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Health checker for system components
pub struct HealthChecker;

impl HealthChecker {
    /// Check database health
    pub async fn check_database(db: &Database) -> ComponentHealth {
        let start = Instant::now();

        match db.health_check().await {
            Ok(_) => ComponentHealth::healthy("database", elapsed_ms(start)),
            Err(e) => ComponentHealth::unhealthy("database", format!("Database error: {}", e), elapsed_ms(start)),
        }
    }

    /// Check configuration validity
    pub fn check_config(config: &AcadflowConfig) -> ComponentHealth {
        let start = Instant::now();

        match config.validate() {
            Ok(()) => ComponentHealth::healthy("configuration", elapsed_ms(start)),
            Err(e) => ComponentHealth::degraded("configuration", e.to_string(), elapsed_ms(start)),
        }
    }

    /// Re-validate the stored step set of every workflow type
    ///
    /// An invalid stored graph means rows were edited outside the step
    /// service; the engine keeps running but transitions may be skipped.
    pub async fn check_step_graphs(steps: &StepDefinitionRepository) -> ComponentHealth {
        let start = Instant::now();
        let mut issues = Vec::new();

        for workflow_type in WorkflowType::ALL {
            match steps.list_by_type(workflow_type).await {
                Ok(set) if set.is_empty() => {}
                Ok(set) => {
                    if let Err(e) = validate_step_graph(&set) {
                        issues.push(format!("{}: {}", workflow_type, e));
                    }
                }
                Err(e) => {
                    return ComponentHealth::unhealthy("step_graph", e.to_string(), elapsed_ms(start));
                }
            }
        }

        if issues.is_empty() {
            ComponentHealth::healthy("step_graph", elapsed_ms(start))
        } else {
            ComponentHealth::degraded("step_graph", issues.join("; "), elapsed_ms(start))
        }
    }

    /// Check that every published deadline resolves
    pub async fn check_deadlines(deadlines: &DeadlineRepository) -> ComponentHealth {
        let start = Instant::now();

        let published = match deadlines.list_published().await {
            Ok(published) => published,
            Err(e) => return ComponentHealth::unhealthy("deadlines", e.to_string(), elapsed_ms(start)),
        };

        let broken: Vec<String> = published
            .iter()
            .filter_map(|d| d.window().err().map(|e| e.to_string()))
            .collect();

        if broken.is_empty() {
            ComponentHealth::healthy("deadlines", elapsed_ms(start))
        } else {
            ComponentHealth::degraded(
                "deadlines",
                format!("{} unresolvable: {}", broken.len(), broken.join("; ")),
                elapsed_ms(start),
            )
        }
    }

    /// Run every check
    pub async fn check_all(db: Arc<Database>, config: &AcadflowConfig) -> HealthReport {
        let database = Self::check_database(&db).await;
        if database.status == HealthStatus::Unhealthy {
            return HealthReport::new(vec![database, Self::check_config(config)]);
        }

        let steps = StepDefinitionRepository::new(db.clone());
        let deadlines = DeadlineRepository::new(db);
        let (step_graph, deadline_check) = futures::join!(
            Self::check_step_graphs(&steps),
            Self::check_deadlines(&deadlines),
        );
        HealthReport::new(vec![
            database,
            Self::check_config(config),
            step_graph,
            deadline_check,
        ])
    }
}
