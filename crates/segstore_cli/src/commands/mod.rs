//! CLI command implementations.

pub mod route;
pub mod smoke;

use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Unsupported `--format` value.
    #[error("unknown output format '{0}' (expected text or json)")]
    UnknownFormat(String),

    /// A smoke workload step returned unexpected data.
    #[error("smoke check failed for segment {segment}: {reason}")]
    Mismatch {
        /// Segment being checked.
        segment: String,
        /// What did not match.
        reason: String,
    },
}

/// Output format shared by commands that print results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable lines.
    Text,
    /// A single JSON document.
    Json,
}

impl OutputFormat {
    /// Parses a `--format` value.
    pub fn parse(format: &str) -> Result<Self, CommandError> {
        match format {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CommandError::UnknownFormat(other.to_string())),
        }
    }
}
