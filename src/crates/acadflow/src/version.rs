//! Version information for acadflow
//!
//! Build number, git commit and build timestamp are injected by `build.rs`.

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build number (from CI or default to 0)
pub const BUILD_NUMBER: &str = env!("BUILD_NUMBER");

/// Git commit hash (short form)
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");

/// Build timestamp (RFC3339 format)
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");

/// Full version string including build metadata
///
/// ```
/// use acadflow::version::full_version;
///
/// assert!(full_version().starts_with("acadflow v"));
/// ```
pub fn full_version() -> String {
    format!(
        "acadflow v{} (build {}, commit {}, built {})",
        VERSION, BUILD_NUMBER, GIT_COMMIT, BUILD_TIMESTAMP
    )
}

/// Short version string (version only)
pub fn short_version() -> String {
    format!("v{}", VERSION)
}
