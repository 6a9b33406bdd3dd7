//! # codeguard_core
//!
//! Diagnostic aggregation and protection policy engine.
//!
//! This crate provides:
//! - Source checkers wrapping the type checker, linter, build, dependency
//!   audit and config audit, plus in-process conflict-marker and
//!   suppression scans
//! - The `IssueAggregator` that runs them concurrently into an `AuditReport`
//! - A fast `ErrorCounter` for polling
//! - The `ProtectionPolicy` deciding save, commit and build gates
//! - Git hook script generation
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use codeguard_core::{CheckContext, GuardConfig, IssueAggregator, TokioProcessRunner};
//!
//! let config = GuardConfig::from_file(".codeguard.json")?;
//! let ctx = CheckContext::new(".", config, Arc::new(TokioProcessRunner))?;
//! let report = IssueAggregator::new(ctx).audit().await?;
//! println!("{} error(s), score {}", report.error_count(), report.quality_score);
//! ```

pub mod aggregator;
pub mod checkers;
mod config;
pub mod counter;
pub mod diagnostics;
mod error;
pub mod file_finder;
pub mod hooks;
mod issue;
pub mod policy;
pub mod process;
pub mod report;
mod score;
mod severity;

pub use aggregator::IssueAggregator;
pub use checkers::{CheckContext, CheckOutcome, CheckSignal, Checker, default_checkers};
pub use config::{ALWAYS_EXCLUDED_DIRS, GuardConfig, ToolKind, ToolOverride, ToolSpec, ToolsConfig};
pub use counter::{CountOrigin, ErrorCounter, ErrorCounts};
pub use diagnostics::{EditorDiagnostics, InMemoryDiagnostics};
pub use error::GuardError;
pub use hooks::{HOOK_MARKER, HookKind, HookScriptGenerator, default_hooks_dir, uninstall};
pub use issue::{
    BusinessConcern, Issue, SYNTHETIC_CODE_PREFIX, Severity, Source, Suppression, SuppressionKind,
    dedupe_issues,
};
pub use policy::{
    Decision, EnforcementLevel, OverrideStatus, PolicyEvent, PolicyState, ProjectClass,
    ProtectionPolicy, Trigger, TriggerKind,
};
pub use process::{ProcessOutput, ProcessRunner, RunOptions, TokioProcessRunner};
pub use report::{AuditReport, CheckNotice, NoticeKind, SourceSummary};
pub use score::ScoringWeights;
pub use severity::SeverityMap;

#[cfg(test)]
pub mod test_utils;
