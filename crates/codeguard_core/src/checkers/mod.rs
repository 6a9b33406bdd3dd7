//! Source checkers.
//!
//! Each checker turns one tool's output (or the raw source text) into
//! normalized [`Issue`]s. A checker's failure is confined to that checker:
//! [`run_isolated`] converts any error into a single synthetic issue naming
//! what could not be checked.

mod build;
mod config_audit;
mod dependency;
mod lint;
mod patterns;
mod suppression;
mod syntax;
mod typecheck;

pub use build::{BuildChecker, parse_build_output};
pub use config_audit::ConfigChecker;
pub use dependency::{AuditFindings, DependencyChecker, parse_audit_output};
pub use lint::{LintChecker, parse_lint_output};
pub use suppression::{SuppressionChecker, scan_text};
pub(crate) use suppression::flagged_suppression_pattern;
pub use syntax::{SyntaxChecker, find_conflict_markers};
pub use typecheck::{TypeCheckChecker, parse_type_check_output};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::{GuardConfig, ToolSpec};
use crate::error::GuardError;
use crate::file_finder::FileFinder;
use crate::issue::{BusinessConcern, Issue, SYNTHETIC_CODE_PREFIX, Source, Suppression};
use crate::process::{ProcessOutput, ProcessRunner, RunOptions};
use crate::severity::SeverityMap;

/// Everything a checker needs to inspect one project.
#[derive(Clone)]
pub struct CheckContext {
    pub root: PathBuf,
    pub config: Arc<GuardConfig>,
    pub runner: Arc<dyn ProcessRunner>,
    /// Files matched by the configured include/exclude patterns.
    pub files: Arc<Vec<PathBuf>>,
}

impl CheckContext {
    /// Creates a context, discovering the project's files.
    pub fn new(
        root: impl Into<PathBuf>,
        config: GuardConfig,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self, GuardError> {
        let root = root.into();
        let finder = FileFinder::new(&config.include, &config.exclude)?;
        let files = finder.discover_files(&root);
        Ok(Self::with_files(root, config, runner, files))
    }

    /// Creates a context over an explicit file list.
    pub fn with_files(
        root: impl Into<PathBuf>,
        config: GuardConfig,
        runner: Arc<dyn ProcessRunner>,
        files: Vec<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            config: Arc::new(config),
            runner,
            files: Arc::new(files),
        }
    }

    /// Runs a configured tool in the project root.
    pub async fn run_tool(&self, spec: &ToolSpec) -> Result<ProcessOutput, GuardError> {
        let options = RunOptions {
            cwd: self.root.clone(),
            timeout: spec.timeout,
            max_output_bytes: self.config.max_output_bytes,
        };
        self.runner.run(&spec.command, &spec.args, &options).await
    }

    /// Expresses `path` relative to the project root when it lies inside it.
    pub fn normalize_path(&self, path: impl AsRef<Path>) -> PathBuf {
        normalize_path(&self.root, path.as_ref())
    }
}

/// Strips `root` from absolute paths inside the project.
pub fn normalize_path(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// Side-channel observations about a check, separate from its findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckSignal {
    /// The tool exited non-zero but no parser recognized its output.
    ParserProducedNothing { tool: String, exit_code: i32 },
    /// Tool output hit the capture limit; findings may be incomplete.
    OutputTruncated { tool: String },
    /// The checker did not apply to this project.
    Skipped { reason: String },
}

/// Result of one checker run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckOutcome {
    pub issues: Vec<Issue>,
    pub suppressions: Vec<Suppression>,
    pub concerns: Vec<BusinessConcern>,
    pub signals: Vec<CheckSignal>,
    /// Exit code of the underlying tool, if one ran.
    pub exit_code: Option<i32>,
}

impl CheckOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            signals: vec![CheckSignal::Skipped {
                reason: reason.into(),
            }],
            ..Default::default()
        }
    }

    pub(crate) fn from_output(tool: &str, output: &ProcessOutput) -> Self {
        let mut outcome = Self {
            exit_code: Some(output.exit_code),
            ..Default::default()
        };
        if output.truncated {
            outcome.signals.push(CheckSignal::OutputTruncated {
                tool: tool.to_string(),
            });
        }
        outcome
    }

    /// Records a failed exit that produced no findings as a signal plus one
    /// synthetic issue.
    pub(crate) fn flag_silent_failure(&mut self, source: Source, tool: &str, map: &SeverityMap) {
        let Some(exit_code) = self.exit_code else {
            return;
        };
        if exit_code == 0 || !self.issues.is_empty() {
            return;
        }
        warn!(
            "{} exited with {} but no diagnostics were recognized",
            tool, exit_code
        );
        self.signals.push(CheckSignal::ParserProducedNothing {
            tool: tool.to_string(),
            exit_code,
        });
        self.issues.push(
            Issue::new(
                source,
                map.tool_failure,
                format!(
                    "{} failed with exit code {} but its output could not be parsed",
                    tool, exit_code
                ),
            )
            .with_code(format!("{SYNTHETIC_CODE_PREFIX}unparsed-output"))
            .with_fix(format!("Run `{}` manually to inspect its output", tool)),
        );
    }

    /// True when the tool failed without producing recognizable output.
    pub fn parser_produced_nothing(&self) -> bool {
        self.signals
            .iter()
            .any(|s| matches!(s, CheckSignal::ParserProducedNothing { .. }))
    }

    pub fn was_skipped(&self) -> bool {
        self.signals
            .iter()
            .any(|s| matches!(s, CheckSignal::Skipped { .. }))
    }
}

/// A single source of findings.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Human-readable name used in synthetic issues and logs.
    fn name(&self) -> &'static str;

    /// Source attributed to issues this checker synthesizes.
    fn source(&self) -> Source;

    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, GuardError>;
}

/// The seven standard checkers, in reporting order.
pub fn default_checkers() -> Vec<Arc<dyn Checker>> {
    vec![
        Arc::new(TypeCheckChecker),
        Arc::new(LintChecker),
        Arc::new(BuildChecker),
        Arc::new(SyntaxChecker),
        Arc::new(SuppressionChecker),
        Arc::new(DependencyChecker),
        Arc::new(ConfigChecker),
    ]
}

/// Runs a checker, converting any failure into one synthetic issue.
pub async fn run_isolated(checker: &dyn Checker, ctx: &CheckContext) -> CheckOutcome {
    match checker.check(ctx).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("{} check failed: {}", checker.name(), e);
            CheckOutcome {
                issues: vec![failure_issue(
                    checker.source(),
                    checker.name(),
                    &e,
                    &ctx.config.severity,
                )],
                ..Default::default()
            }
        }
    }
}

/// Synthetic issue standing in for a checker that could not run.
pub fn failure_issue(source: Source, name: &str, err: &GuardError, map: &SeverityMap) -> Issue {
    let (code, fix) = match err {
        GuardError::ToolUnavailable { tool, .. } => (
            "tool-unavailable",
            format!("Install `{}` or configure another command for {}", tool, name),
        ),
        GuardError::ToolTimeout { .. } => (
            "tool-timeout",
            format!("Raise the {} timeout or speed up the tool", name),
        ),
        _ => (
            "check-failed",
            "Re-run with --verbose for details".to_string(),
        ),
    };
    Issue::new(source, map.tool_failure, format!("Could not check {}: {}", name, err))
        .with_code(format!("{SYNTHETIC_CODE_PREFIX}{code}"))
        .with_fix(fix)
}

/// Balanced JSON arrays and objects embedded in `text`, one per opening
/// bracket, in order of appearance.
///
/// Brackets inside string literals are ignored. A block that is not valid
/// JSON (a `[WARN]` prefix, say) is still yielded; callers try the next.
pub(crate) fn json_blocks(text: &str) -> impl Iterator<Item = &str> {
    text.match_indices(['[', '{'])
        .filter_map(move |(start, _)| balanced_block(&text[start..]))
}

fn balanced_block(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[..offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses JSON from the first of `candidates` that yields a `T`, trying each
/// whole text before any embedded block.
pub(crate) fn parse_json_candidates<T>(candidates: &[&str]) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    candidates
        .iter()
        .find_map(|text| serde_json::from_str(text.trim()).ok())
        .or_else(|| {
            candidates.iter().find_map(|text| {
                json_blocks(text).find_map(|block| serde_json::from_str(block).ok())
            })
        })
}

/// Reads a file as text, skipping unreadable or non-UTF-8 files.
pub(crate) fn read_source(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::debug!("Skipping {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Severity;
    use pretty_assertions::assert_eq;

    fn first_block(text: &str) -> Option<&str> {
        json_blocks(text).next()
    }

    #[test]
    fn test_json_block_skips_leading_noise() {
        let text = "npm WARN something\n[{\"a\": \"]\"}]\ntrailing";
        assert_eq!(first_block(text), Some("[{\"a\": \"]\"}]"));
    }

    #[test]
    fn test_json_block_handles_escaped_quotes() {
        let text = r#"noise {"msg": "say \"}\" please", "n": 1} more"#;
        assert_eq!(
            first_block(text),
            Some(r#"{"msg": "say \"}\" please", "n": 1}"#)
        );
    }

    #[test]
    fn test_json_block_unbalanced() {
        assert_eq!(first_block("[{\"a\": 1}"), None);
        assert_eq!(first_block("no json here"), None);
    }

    #[test]
    fn test_bracketed_warning_before_json_is_skipped() {
        let text = "(node:4242) [DEP0040] DeprecationWarning: The `punycode` module is deprecated.\n\
                    {\"vulnerabilities\": {}}\n";
        let value: serde_json::Map<String, serde_json::Value> =
            parse_json_candidates(&[text]).unwrap();
        assert!(value.contains_key("vulnerabilities"));
    }

    #[test]
    fn test_block_of_the_wrong_shape_is_skipped() {
        let text = "[1, 2] then {\"ok\": true}";
        let value: serde_json::Map<String, serde_json::Value> =
            parse_json_candidates(&[text]).unwrap();
        assert_eq!(value["ok"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_silent_failure_adds_signal_and_synthetic_issue() {
        let mut outcome = CheckOutcome {
            exit_code: Some(2),
            ..Default::default()
        };
        outcome.flag_silent_failure(Source::Lint, "lint", &SeverityMap::default());
        assert!(outcome.parser_produced_nothing());
        assert_eq!(outcome.issues.len(), 1);
        assert!(outcome.issues[0].is_synthetic());
        assert_eq!(outcome.issues[0].severity, Severity::High);
    }

    #[test]
    fn test_silent_failure_ignores_clean_exit() {
        let mut outcome = CheckOutcome {
            exit_code: Some(0),
            ..Default::default()
        };
        outcome.flag_silent_failure(Source::Lint, "lint", &SeverityMap::default());
        assert!(outcome.issues.is_empty());
        assert!(outcome.signals.is_empty());
    }

    #[test]
    fn test_failure_issue_names_the_tool() {
        let err = GuardError::tool_unavailable("npx", "No such file or directory");
        let issue = failure_issue(Source::TypeCheck, "type-check", &err, &SeverityMap::default());
        assert!(issue.message.starts_with("Could not check type-check"));
        assert_eq!(issue.code.as_deref(), Some("codeguard/tool-unavailable"));
        assert_eq!(issue.severity, Severity::High);
    }

    #[test]
    fn test_normalize_path() {
        let root = Path::new("/work/app");
        assert_eq!(
            normalize_path(root, Path::new("/work/app/src/a.ts")),
            PathBuf::from("src/a.ts")
        );
        assert_eq!(
            normalize_path(root, Path::new("src/b.ts")),
            PathBuf::from("src/b.ts")
        );
    }
}
