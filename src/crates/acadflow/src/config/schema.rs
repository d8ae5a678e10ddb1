//! Configuration schema for acadflow

use crate::error::{AcadflowError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main acadflow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AcadflowConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Transition engine configuration
    pub engine: EngineConfig,

    /// Staff roles used by the command line
    pub roles: RolesConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path (relative to ~/.acadflow or absolute)
    pub path: String,

    /// Connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "acadflow.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,

    /// Log format: "compact", "pretty", "json"
    pub format: String,

    /// Enable colored output
    pub colored: bool,

    /// Show timestamps
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            colored: true,
            timestamps: true,
        }
    }
}

/// Transition engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between scheduled runs
    pub interval_secs: u64,

    /// Activities processed concurrently within one run
    pub max_parallel_units: usize,

    /// Also move `late` activities to `overdue` once their deadline locks
    pub escalate_late: bool,

    /// Persist every run summary to the engine_runs table
    pub record_runs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            max_parallel_units: 4,
            escalate_late: false,
            record_runs: true,
        }
    }
}

/// Staff roles known to the command line
///
/// Library callers supply their own [`crate::services::RoleResolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RolesConfig {
    /// Actors treated as administrators of every activity
    pub administrators: Vec<String>,
}

impl AcadflowConfig {
    /// Resolve environment variables in configuration values
    ///
    /// Supports ${VAR_NAME} syntax in string fields
    pub fn resolve_env_vars(&mut self) {
        self.database.path = Self::expand_env_var(&self.database.path);
        self.logging.level = Self::expand_env_var(&self.logging.level);
        for admin in &mut self.roles.administrators {
            *admin = Self::expand_env_var(admin);
        }
    }

    /// Expand environment variable in a string
    ///
    /// Supports ${VAR_NAME} syntax
    fn expand_env_var(value: &str) -> String {
        match value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
            Some(var_name) => std::env::var(var_name).unwrap_or_else(|_| value.to_string()),
            None => value.to_string(),
        }
    }

    /// Reject values the engine and database cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.engine.interval_secs == 0 {
            return Err(AcadflowError::Config(
                "engine.interval_secs must be at least 1".to_string(),
            ));
        }
        if self.engine.max_parallel_units == 0 {
            return Err(AcadflowError::Config(
                "engine.max_parallel_units must be at least 1".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(AcadflowError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "compact" | "pretty" | "json") {
            return Err(AcadflowError::Config(format!(
                "logging.format must be compact, pretty or json, got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Get the resolved database path
    ///
    /// If path is relative, resolves it relative to ~/.acadflow
    pub fn database_path(&self) -> Result<PathBuf> {
        let path = PathBuf::from(&self.database.path);

        if path.is_absolute() {
            return Ok(path);
        }
        let home = dirs::home_dir()
            .ok_or_else(|| AcadflowError::Config("Failed to get home directory".to_string()))?;
        Ok(home.join(".acadflow").join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AcadflowConfig::default();
        assert_eq!(config.database.path, "acadflow.db");
        assert_eq!(config.engine.interval_secs, 300);
        assert_eq!(config.engine.max_parallel_units, 4);
        assert!(!config.engine.escalate_late);
        assert!(config.engine.record_runs);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: AcadflowConfig = toml::from_str(
            r#"
            [engine]
            escalate_late = true
            "#,
        )
        .unwrap();
        assert!(config.engine.escalate_late);
        assert_eq!(config.engine.interval_secs, 300);
        assert_eq!(config.database.path, "acadflow.db");
    }

    #[test]
    fn test_env_var_expansion() {
        let mut config = AcadflowConfig::default();
        config.database.path = "${ACADFLOW_TEST_DB_PATH}".to_string();
        config.roles.administrators = vec!["${ACADFLOW_TEST_ADMIN}".to_string(), "registrar".to_string()];

        std::env::set_var("ACADFLOW_TEST_DB_PATH", "/tmp/acadflow-test.db");
        std::env::set_var("ACADFLOW_TEST_ADMIN", "dean");
        config.resolve_env_vars();

        assert_eq!(config.database.path, "/tmp/acadflow-test.db");
        assert_eq!(config.roles.administrators, vec!["dean", "registrar"]);

        std::env::remove_var("ACADFLOW_TEST_DB_PATH");
        std::env::remove_var("ACADFLOW_TEST_ADMIN");
    }

    #[test]
    fn test_unset_env_var_is_left_verbatim() {
        assert_eq!(
            AcadflowConfig::expand_env_var("${ACADFLOW_TEST_SURELY_UNSET}"),
            "${ACADFLOW_TEST_SURELY_UNSET}"
        );
        assert_eq!(AcadflowConfig::expand_env_var("plain"), "plain");
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let mut config = AcadflowConfig::default();
        config.engine.max_parallel_units = 0;
        assert!(matches!(config.validate(), Err(AcadflowError::Config(_))));

        let mut config = AcadflowConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_absolute() {
        let mut config = AcadflowConfig::default();
        config.database.path = "/tmp/test.db".to_string();
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/test.db"));
    }
}
