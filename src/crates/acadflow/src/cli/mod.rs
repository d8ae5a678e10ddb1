//! CLI command implementations
//!
//! Provides command handlers for the acadflow CLI binary.

pub mod activity;
pub mod config;
pub mod deadline;
pub mod engine;
pub mod step;

pub use config::{get_init_instructions, is_initialized, CliContext};

use crate::error::{AcadflowError, Result};
use chrono::{DateTime, Utc};

/// Format a Unix timestamp for table output
pub(crate) fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// First eight characters of an identifier
pub(crate) fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Parse an RFC 3339 instant given on the command line
pub(crate) fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            AcadflowError::InvalidInput(format!(
                "'{}' is not an RFC 3339 instant (e.g. 2026-03-15T23:59:59Z): {}",
                value, e
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instant_normalises_offset() {
        let instant = parse_instant("2026-03-16T06:59:59+07:00").unwrap();
        assert_eq!(instant.to_rfc3339(), "2026-03-15T23:59:59+00:00");
        assert!(parse_instant("next tuesday").is_err());
    }

    #[test]
    fn test_short_id_and_timestamp() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(format_timestamp(0), "1970-01-01 00:00");
    }
}
