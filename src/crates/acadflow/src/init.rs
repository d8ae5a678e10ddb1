//! First-time setup
//!
//! Creates the acadflow home directory and a commented default
//! configuration file. The database itself is created and migrated on
//! first use.

use crate::error::{AcadflowError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default configuration directory name
pub const CONFIG_DIR: &str = ".acadflow";

/// Default configuration file name
pub const CONFIG_FILE: &str = "acadflow.toml";

/// Get the acadflow home directory (~/.acadflow)
pub fn acadflow_home() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR))
        .ok_or_else(|| AcadflowError::Config("Could not determine home directory".to_string()))
}

/// Initialize ~/.acadflow
///
/// Returns the path of the configuration file.
pub fn initialize(force: bool) -> Result<PathBuf> {
    initialize_in(&acadflow_home()?, force)
}

/// Initialize a configuration directory at an explicit location
pub fn initialize_in(home: &Path, force: bool) -> Result<PathBuf> {
    info!(path = %home.display(), "Initializing acadflow");

    if !home.exists() {
        fs::create_dir_all(home)
            .map_err(|e| AcadflowError::Config(format!("Failed to create directory: {}", e)))?;
        info!(path = %home.display(), "Created acadflow home directory");
    }

    let config_path = home.join(CONFIG_FILE);
    if !config_path.exists() || force {
        write_default_config(&config_path)?;
        info!(path = %config_path.display(), "Created default configuration");
    } else {
        warn!(path = %config_path.display(), "Configuration already exists (use --force to overwrite)");
    }

    Ok(config_path)
}

fn write_default_config(path: &Path) -> Result<()> {
    let default_config = r#"# acadflow configuration
#
# User-level file. Project-specific overrides go in ./.acadflow/acadflow.toml;
# only the keys set there replace the values below.

[database]
# Database file path (relative to ~/.acadflow, or absolute)
path = "acadflow.db"
max_connections = 5

[logging]
# Log level: "trace", "debug", "info", "warn", "error" (RUST_LOG wins if set)
level = "info"

# Log format: "compact", "pretty", "json"
format = "compact"

[engine]
# Seconds between scheduled transition runs
interval_secs = 300

# Activities processed concurrently within one run
max_parallel_units = 4

# Also move activities already on a late step to overdue once locked
escalate_late = false

# Keep a summary of every run in the database
record_runs = true

[roles]
# Actors allowed to override steps from the command line
# (values may reference environment variables like ${ACADFLOW_ADMIN})
administrators = []
"#;

    fs::write(path, default_config)
        .map_err(|e| AcadflowError::Config(format!("Failed to write configuration: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AcadflowConfig;
    use tempfile::TempDir;

    #[test]
    fn test_acadflow_home() {
        let home = acadflow_home().unwrap();
        assert!(home.to_string_lossy().contains(CONFIG_DIR));
    }

    #[test]
    fn test_default_config_parses_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = initialize_in(&temp_dir.path().join("home"), false).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        let parsed: AcadflowConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, AcadflowConfig::default());
    }

    #[test]
    fn test_existing_config_is_kept_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "[engine]\ninterval_secs = 5\n").unwrap();

        initialize_in(temp_dir.path(), false).unwrap();
        assert!(fs::read_to_string(&config_path).unwrap().contains("interval_secs = 5"));

        initialize_in(temp_dir.path(), true).unwrap();
        assert!(fs::read_to_string(&config_path).unwrap().contains("interval_secs = 300"));
    }
}
