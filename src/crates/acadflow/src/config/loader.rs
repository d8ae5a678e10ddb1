//! Configuration loader with dual-location support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.acadflow/acadflow.toml
//! 3. Project-level config: ./.acadflow/acadflow.toml
//!
//! Layers are merged table by table, so a later file only overrides the keys
//! it actually sets.

use crate::config::schema::AcadflowConfig;
use crate::error::{AcadflowError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use toml::Value;
use tracing::{debug, info};

/// Configuration loader that handles both user and project configs
pub struct ConfigLoader {
    user_config_path: PathBuf,
    project_config_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the standard locations
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| AcadflowError::Config("Failed to get home directory".to_string()))?;
        let cwd = std::env::current_dir()?;
        Ok(Self::with_paths(
            home.join(".acadflow").join("acadflow.toml"),
            cwd.join(".acadflow").join("acadflow.toml"),
        ))
    }

    /// Create a loader for explicit file locations
    pub fn with_paths(user_config_path: impl Into<PathBuf>, project_config_path: impl Into<PathBuf>) -> Self {
        Self {
            user_config_path: user_config_path.into(),
            project_config_path: project_config_path.into(),
        }
    }

    /// Load configuration from both locations with project taking precedence
    ///
    /// A missing file is skipped; a file that exists but does not parse is an
    /// error.
    pub async fn load(&self) -> Result<AcadflowConfig> {
        let mut merged = Value::try_from(AcadflowConfig::default())
            .map_err(|e| AcadflowError::Config(format!("Failed to encode defaults: {}", e)))?;
        info!("Loading configuration with defaults");

        for path in [&self.user_config_path, &self.project_config_path] {
            match self.load_layer(path).await? {
                Some(layer) => {
                    debug!(path = %path.display(), "Loaded config layer");
                    merge_values(&mut merged, layer);
                }
                None => {
                    debug!(path = %path.display(), "Config layer not found, skipping");
                }
            }
        }

        let mut config: AcadflowConfig = merged
            .try_into()
            .map_err(|e| AcadflowError::Config(format!("Failed to parse config: {}", e)))?;

        // Resolve environment variables
        config.resolve_env_vars();
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    async fn load_layer(&self, path: &Path) -> Result<Option<Value>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| AcadflowError::Config(format!("Failed to read config {}: {}", path.display(), e)))?;

        let value: Value = toml::from_str(&content)
            .map_err(|e| AcadflowError::Config(format!("Failed to parse config {}: {}", path.display(), e)))?;

        Ok(Some(value))
    }

    /// Get user config path
    pub fn user_config_path(&self) -> &Path {
        &self.user_config_path
    }

    /// Get project config path
    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }
}

/// Merge `overlay` into `base`; tables merge recursively, anything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_table), Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_paths() {
        let loader = ConfigLoader::new().unwrap();
        assert!(loader.user_config_path().ends_with(".acadflow/acadflow.toml"));
        assert!(loader.project_config_path().ends_with(".acadflow/acadflow.toml"));
    }

    #[tokio::test]
    async fn test_load_returns_defaults_when_no_files() {
        let loader = ConfigLoader::with_paths("/nonexistent/user.toml", "/nonexistent/project.toml");
        let config = loader.load().await.unwrap();
        assert_eq!(config, AcadflowConfig::default());
    }

    #[tokio::test]
    async fn test_project_overrides_user_key_by_key() {
        let temp_dir = TempDir::new().unwrap();
        let user_path = temp_dir.path().join("user.toml");
        let project_path = temp_dir.path().join("project.toml");

        fs::write(
            &user_path,
            r#"
[engine]
interval_secs = 60
max_parallel_units = 8

[logging]
level = "debug"
"#,
        )
        .await
        .unwrap();
        fs::write(
            &project_path,
            r#"
[engine]
interval_secs = 30

[database]
path = "/tmp/project.db"
"#,
        )
        .await
        .unwrap();

        let config = ConfigLoader::with_paths(&user_path, &project_path)
            .load()
            .await
            .unwrap();

        assert_eq!(config.engine.interval_secs, 30);
        // set only in the user layer
        assert_eq!(config.engine.max_parallel_units, 8);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.database.path, "/tmp/project.db");
        assert!(!config.engine.escalate_late);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let user_path = temp_dir.path().join("user.toml");
        fs::write(&user_path, "[engine\ninterval_secs = ").await.unwrap();

        let err = ConfigLoader::with_paths(&user_path, "/nonexistent/project.toml")
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, AcadflowError::Config(_)));
    }

    #[tokio::test]
    async fn test_invalid_values_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let project_path = temp_dir.path().join("project.toml");
        fs::write(&project_path, "[engine]\nmax_parallel_units = 0\n").await.unwrap();

        let result = ConfigLoader::with_paths("/nonexistent/user.toml", &project_path)
            .load()
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_values_replaces_scalars_and_arrays() {
        let mut base: Value = toml::from_str("[roles]\nadministrators = [\"a\", \"b\"]\n").unwrap();
        let overlay: Value = toml::from_str("[roles]\nadministrators = [\"c\"]\n").unwrap();
        merge_values(&mut base, overlay);
        assert_eq!(
            base["roles"]["administrators"],
            Value::Array(vec![Value::String("c".to_string())])
        );
    }
}
