//! Configuration management for acadflow
//!
//! Supports dual-location configuration:
//! - User-level: ~/.acadflow/acadflow.toml
//! - Project-level: ./.acadflow/acadflow.toml
//!
//! Project-level config overrides user-level config key by key.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{AcadflowConfig, DatabaseConfig, EngineConfig, LoggingConfig, RolesConfig};

use crate::Result;

/// Load configuration from both locations with project config taking precedence
///
/// Priority order:
/// 1. Default values
/// 2. User-level config (~/.acadflow/acadflow.toml)
/// 3. Project-level config (./.acadflow/acadflow.toml)
pub async fn load_config() -> Result<AcadflowConfig> {
    let loader = ConfigLoader::new()?;
    loader.load().await
}
