use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::patterns::{PatternSet, strip_ansi};
use super::{CheckContext, CheckOutcome, Checker, normalize_path, parse_json_candidates};
use crate::config::ToolKind;
use crate::error::GuardError;
use crate::issue::{Issue, Source};
use crate::severity::SeverityMap;

/// One file entry of the linter's JSON formatter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LintFileResult {
    file_path: String,
    #[serde(default)]
    messages: Vec<LintMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LintMessage {
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    severity: u64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
    #[serde(default)]
    fatal: bool,
    #[serde(default)]
    fix: Option<serde_json::Value>,
}

//   3:10  error  'x' is assigned a value but never used  no-unused-vars
static STYLISH_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(\d+):(\d+)\s+(error|warning)\s+(.+?)(?:\s{2,}(\S+))?\s*$")
        .expect("valid stylish regex")
});

static UNIX_PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| {
    PatternSet::new(&[(
        "unix",
        r"(?m)^(?P<file>[^:\n]+):(?P<line>\d+):(?P<col>\d+):\s*(?P<message>.+?)\s*\[(?P<level>Error|Warning)(?:/(?P<code>[^\]]+))?\]\s*$",
    )])
});

fn lint_fix(rule: Option<&str>, fixable: bool) -> String {
    match (rule, fixable) {
        (_, true) => "Run the linter with --fix".to_string(),
        (Some(rule), false) => format!("Resolve the {} violation", rule),
        (None, false) => "Fix the syntax error reported by the linter".to_string(),
    }
}

fn from_json(results: Vec<LintFileResult>, root: &Path, map: &SeverityMap) -> Vec<Issue> {
    results
        .into_iter()
        .flat_map(|file| {
            let path = normalize_path(root, Path::new(&file.file_path));
            file.messages.into_iter().map(move |m| {
                let severity = map.lint(m.severity, m.fatal);
                let fix = lint_fix(m.rule_id.as_deref(), m.fix.is_some());
                let mut issue = Issue::new(Source::Lint, severity, m.message)
                    .at(path.clone(), m.line.unwrap_or(0), m.column.unwrap_or(0))
                    .with_fix(fix);
                if let Some(rule) = m.rule_id {
                    issue = issue.with_code(rule);
                }
                issue
            })
        })
        .collect()
}

fn from_stylish(text: &str, root: &Path, map: &SeverityMap) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut current: Option<PathBuf> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(caps) = STYLISH_LINE.captures(line) {
            let Some(file) = &current else {
                continue;
            };
            let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let rule = caps.get(5).map(|m| m.as_str().to_string());
            let mut issue = Issue::new(Source::Lint, map.lint_token(&caps[3]), caps[4].trim())
                .at(file.clone(), number(1), number(2))
                .with_fix(lint_fix(rule.as_deref(), false));
            if let Some(rule) = rule {
                issue = issue.with_code(rule);
            }
            issues.push(issue);
        } else if !line.starts_with(char::is_whitespace) && !line.starts_with('\u{2716}') {
            current = Some(normalize_path(root, Path::new(line.trim())));
        }
    }
    issues
}

fn from_unix(text: &str, root: &Path, map: &SeverityMap) -> Vec<Issue> {
    let Some(found) = UNIX_PATTERNS.best(text) else {
        return Vec::new();
    };
    found
        .diagnostics
        .into_iter()
        .map(|d| {
            let file = d.file.unwrap_or_default();
            let mut issue = Issue::new(
                Source::Lint,
                map.lint_token(d.level.as_deref().unwrap_or("error")),
                d.message,
            )
            .at(normalize_path(root, Path::new(&file)), d.line, d.column)
            .with_fix(lint_fix(d.code.as_deref(), false));
            if let Some(code) = d.code {
                issue = issue.with_code(code);
            }
            issue
        })
        .collect()
}

/// Parses linter output through a chain of fallbacks.
///
/// JSON on stdout, JSON on stderr, JSON embedded in noise, then the
/// `stylish` and `unix` text formats. Returns `None` when nothing in the
/// output was recognized.
pub fn parse_lint_output(
    stdout: &str,
    stderr: &str,
    root: &Path,
    map: &SeverityMap,
) -> Option<Vec<Issue>> {
    if let Some(results) = parse_json_candidates::<Vec<LintFileResult>>(&[stdout, stderr]) {
        return Some(from_json(results, root, map));
    }
    debug!("lint output is not JSON, falling back to text formats");

    let text = strip_ansi(&format!("{}\n{}", stdout, stderr)).into_owned();
    let stylish = from_stylish(&text, root, map);
    if !stylish.is_empty() {
        return Some(stylish);
    }
    let unix = from_unix(&text, root, map);
    if !unix.is_empty() {
        return Some(unix);
    }
    if text.trim().is_empty() {
        return Some(Vec::new());
    }
    None
}

/// Runs the linter.
pub struct LintChecker;

#[async_trait]
impl Checker for LintChecker {
    fn name(&self) -> &'static str {
        ToolKind::Lint.name()
    }

    fn source(&self) -> Source {
        Source::Lint
    }

    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, GuardError> {
        let spec = ctx.config.tool(ToolKind::Lint);
        if !spec.enabled {
            return Ok(CheckOutcome::skipped("lint disabled"));
        }

        let output = ctx.run_tool(&spec).await?;
        let mut outcome = CheckOutcome::from_output(self.name(), &output);
        match parse_lint_output(&output.stdout, &output.stderr, &ctx.root, &ctx.config.severity) {
            Some(issues) => outcome.issues = issues,
            None => debug!("lint output not recognized by any parser"),
        }
        outcome.flag_silent_failure(Source::Lint, self.name(), &ctx.config.severity);
        Ok(outcome)
    }
}
