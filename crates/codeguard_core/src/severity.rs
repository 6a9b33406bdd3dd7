//! Explicit mapping from tool-native levels to [`Severity`].
//!
//! Every checker goes through this table instead of hard-coding its own
//! bucketing, so a project can promote or demote a whole class of findings
//! from configuration.

use serde::{Deserialize, Serialize};

use crate::issue::Severity;

/// Tool-level to severity table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeverityMap {
    /// Lint severity 2.
    pub lint_error: Severity,
    /// Lint severity 1.
    pub lint_warning: Severity,
    /// Lint fatal (parse) errors.
    pub lint_fatal: Severity,
    pub type_error: Severity,
    pub type_warning: Severity,
    /// Type checker `message` / `info` diagnostics.
    pub type_info: Severity,
    pub build_error: Severity,
    pub build_warning: Severity,
    pub dependency_critical: Severity,
    pub dependency_high: Severity,
    pub dependency_moderate: Severity,
    /// Dependency `low` and `info` advisories.
    pub dependency_low: Severity,
    pub config_invalid: Severity,
    pub config_mismatch: Severity,
    pub merge_conflict: Severity,
    /// Synthetic issues for missing, timed-out or unparseable tools.
    pub tool_failure: Severity,
    /// Any level not covered above.
    pub fallback: Severity,
}

impl Default for SeverityMap {
    fn default() -> Self {
        Self {
            lint_error: Severity::High,
            lint_warning: Severity::Medium,
            lint_fatal: Severity::Critical,
            type_error: Severity::High,
            type_warning: Severity::Medium,
            type_info: Severity::Low,
            build_error: Severity::High,
            build_warning: Severity::Medium,
            dependency_critical: Severity::Critical,
            dependency_high: Severity::High,
            dependency_moderate: Severity::Medium,
            dependency_low: Severity::Low,
            config_invalid: Severity::Critical,
            config_mismatch: Severity::High,
            merge_conflict: Severity::Critical,
            tool_failure: Severity::High,
            fallback: Severity::Medium,
        }
    }
}

impl SeverityMap {
    /// Maps an ESLint-style numeric severity.
    pub fn lint(&self, level: u64, fatal: bool) -> Severity {
        if fatal {
            return self.lint_fatal;
        }
        match level {
            2 => self.lint_error,
            1 => self.lint_warning,
            _ => self.fallback,
        }
    }

    /// Maps a textual lint level (`error`, `warning`).
    pub fn lint_token(&self, token: &str) -> Severity {
        match token.to_ascii_lowercase().as_str() {
            "error" => self.lint_error,
            "warning" | "warn" => self.lint_warning,
            _ => self.fallback,
        }
    }

    /// Maps a type checker category token.
    pub fn type_check(&self, token: &str) -> Severity {
        match token.to_ascii_lowercase().as_str() {
            "error" => self.type_error,
            "warning" => self.type_warning,
            "message" | "info" | "suggestion" => self.type_info,
            _ => self.fallback,
        }
    }

    /// Maps a build log level token.
    pub fn build(&self, token: &str) -> Severity {
        match token.to_ascii_lowercase().as_str() {
            "error" | "fatal" => self.build_error,
            "warning" | "warn" => self.build_warning,
            _ => self.fallback,
        }
    }

    /// Maps a package audit advisory level.
    pub fn dependency(&self, token: &str) -> Severity {
        match token.to_ascii_lowercase().as_str() {
            "critical" => self.dependency_critical,
            "high" => self.dependency_high,
            "moderate" | "medium" => self.dependency_moderate,
            "low" | "info" => self.dependency_low,
            _ => self.fallback,
        }
    }
}
