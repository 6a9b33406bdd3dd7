//! Normalized finding types shared by every checker.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Code prefix reserved for issues synthesized by codeguard itself
/// (tool missing, tool timed out, output could not be parsed).
pub const SYNTHETIC_CODE_PREFIX: &str = "codeguard/";

/// Which checker produced an issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Source {
    TypeCheck,
    Lint,
    Build,
    Syntax,
    Dependency,
    Config,
}

impl Source {
    /// All sources in reporting order.
    pub const ALL: [Source; 6] = [
        Source::TypeCheck,
        Source::Lint,
        Source::Build,
        Source::Syntax,
        Source::Dependency,
        Source::Config,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::TypeCheck => "type-check",
            Source::Lint => "lint",
            Source::Build => "build",
            Source::Syntax => "syntax",
            Source::Dependency => "dependency",
            Source::Config => "config",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an issue.
///
/// Variants are declared from most to least severe, so the derived `Ord`
/// sorts `Critical` first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Critical and High count as errors.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }

    /// Medium and Low count as warnings.
    pub fn is_warning(&self) -> bool {
        !self.is_error()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// File the finding refers to; empty for project-level findings.
    pub file: PathBuf,
    /// 1-based line, 0 when unknown.
    pub line: u32,
    /// 1-based column, 0 when unknown.
    pub column: u32,
    pub source: Source,
    pub severity: Severity,
    pub message: String,
    pub suggested_fix: String,
    /// Tool-specific diagnostic code (e.g. `TS2322`, a lint rule id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Issue {
    /// Creates a project-level issue with no location.
    pub fn new(source: Source, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            file: PathBuf::new(),
            line: 0,
            column: 0,
            source,
            severity,
            message: message.into(),
            suggested_fix: String::new(),
            code: None,
        }
    }

    /// Sets the location.
    pub fn at(mut self, file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self.column = column;
        self
    }

    /// Sets the diagnostic code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the suggested fix.
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = fix.into();
        self
    }

    /// True for issues codeguard synthesized because a tool failed.
    pub fn is_synthetic(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|c| c.starts_with(SYNTHETIC_CODE_PREFIX))
    }

    /// Canonical report ordering: severity, then location.
    pub fn sort_key(&self) -> (Severity, &Path, u32, u32) {
        (self.severity, self.file.as_path(), self.line, self.column)
    }
}

/// Kind of in-source suppression directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuppressionKind {
    /// `@ts-ignore`
    IgnoreLine,
    /// `@ts-expect-error`
    ExpectError,
    /// `@ts-nocheck`, `/* eslint-disable */`
    DisableFile,
    /// `eslint-disable-line`, `eslint-disable-next-line`
    DisableRule,
}

/// A directive in source that silences a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suppression {
    pub file: PathBuf,
    pub line: u32,
    pub kind: SuppressionKind,
    /// Suppressed rule; `None` or `*` means every rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// True for blanket suppressions considered unsafe.
    pub should_flag: bool,
}

impl Suppression {
    pub fn new(
        file: impl Into<PathBuf>,
        line: u32,
        kind: SuppressionKind,
        rule: Option<String>,
    ) -> Self {
        let blanket = rule.as_deref().is_none_or(|r| r.trim() == "*");
        Self {
            file: file.into(),
            line,
            kind,
            rule,
            should_flag: kind != SuppressionKind::ExpectError && blanket,
        }
    }
}

/// A TODO/FIXME/HACK/XXX marker. Reported beside issues, never counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessConcern {
    pub file: PathBuf,
    pub line: u32,
    pub marker: String,
    pub text: String,
}

/// Removes issues with identical (file, line, column, code) keys, keeping the
/// first occurrence. An absent code compares by message.
pub fn dedupe_issues(issues: &mut Vec<Issue>) {
    let mut seen: HashSet<(PathBuf, u32, u32, String)> = HashSet::new();
    issues.retain(|issue| {
        let code = issue
            .code
            .clone()
            .unwrap_or_else(|| format!("message:{}", issue.message));
        seen.insert((issue.file.clone(), issue.line, issue.column, code))
    });
}
