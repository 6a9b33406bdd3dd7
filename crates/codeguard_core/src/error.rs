//! Guard error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while checking a project or deciding a gate.
#[derive(Debug, Error)]
pub enum GuardError {
    /// External binary is missing or could not be spawned.
    #[error("Tool unavailable: {tool} ({reason})")]
    ToolUnavailable { tool: String, reason: String },

    /// External process exceeded its time bound and was killed.
    #[error("Tool timed out: {tool} after {}ms", timeout.as_millis())]
    ToolTimeout { tool: String, timeout: Duration },

    /// Tool output did not match any known shape.
    #[error("Parse error: {0}")]
    ParseFailure(String),

    /// A project configuration file is malformed.
    #[error("Invalid config file {}: {message}", path.display())]
    ConfigInvalid { path: PathBuf, message: String },

    /// Project classification could not complete.
    #[error("Classification failed: {0}")]
    ClassificationFailure(String),

    /// A hook file exists that codeguard did not write.
    #[error("Refusing to replace hook not managed by codeguard: {}", .0.display())]
    ForeignHook(PathBuf),

    /// codeguard's own configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GuardError {
    /// Creates a tool-unavailable error.
    pub fn tool_unavailable(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolUnavailable {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Creates a tool-timeout error.
    pub fn tool_timeout(tool: impl Into<String>, timeout: Duration) -> Self {
        Self::ToolTimeout {
            tool: tool.into(),
            timeout,
        }
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseFailure(message.into())
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an invalid-config-file error.
    pub fn config_invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true for failures that mean "the tool could not run at all".
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, Self::ToolUnavailable { .. } | Self::ToolTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_includes_millis() {
        let err = GuardError::tool_timeout("build", Duration::from_secs(2));
        assert_eq!(err.to_string(), "Tool timed out: build after 2000ms");
        assert!(err.is_tool_failure());
    }

    #[test]
    fn test_parse_failure_is_not_tool_failure() {
        assert!(!GuardError::parse("garbage").is_tool_failure());
    }
}
