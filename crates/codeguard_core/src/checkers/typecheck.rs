use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::debug;

use super::patterns::{PatternSet, strip_ansi};
use super::{CheckContext, CheckOutcome, Checker, normalize_path};
use crate::config::ToolKind;
use crate::error::GuardError;
use crate::issue::{Issue, Source};
use crate::severity::SeverityMap;

static TYPE_CHECK_PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| {
    PatternSet::new(&[
        // src/a.ts(3,7): error TS2322: Type 'string' is not assignable...
        (
            "paren",
            r"(?m)^(?P<file>[^\s(][^(\n]*?)\((?P<line>\d+),(?P<col>\d+)\):\s+(?P<level>error|warning|message)\s+(?P<code>TS\d+):\s*(?P<message>.+)$",
        ),
        // src/a.ts:3:7 - error TS2322: ...
        (
            "pretty",
            r"(?m)^(?P<file>[^\s:][^:\n]*?):(?P<line>\d+):(?P<col>\d+)\s+-\s+(?P<level>error|warning|message)\s+(?P<code>TS\d+):\s*(?P<message>.+)$",
        ),
        (
            "positional",
            r"(?m)^(?P<file>[^\s:][^:\n]*?):(?P<line>\d+):(?P<col>\d+):?\s+(?P<level>error|warning)\b:?\s*(?P<message>.+)$",
        ),
        // error TS5083: Cannot read file 'tsconfig.base.json'.
        (
            "global",
            r"(?m)^\s*(?P<level>error|warning)\s+(?P<code>TS\d+):\s*(?P<message>.+)$",
        ),
    ])
});

/// Best-effort fixes for the most common type checker codes.
fn suggested_fix(code: Option<&str>) -> &'static str {
    match code {
        Some("TS2304") => "Import or declare the missing name",
        Some("TS2322") => "Make the assigned value match the declared type, or widen the type",
        Some("TS2339") => "Add the property to the type or narrow the value before access",
        Some("TS2345") => "Convert the argument or update the parameter type",
        Some("TS7006") => "Add an explicit type annotation to the parameter",
        Some("TS18048") | Some("TS2532") => "Guard against undefined before use",
        Some("TS2307") => "Install the module or fix the import path",
        _ => "Fix the type error reported by the type checker",
    }
}

/// Parses type checker text output into issues.
///
/// Returns an empty list when no pattern matches.
pub fn parse_type_check_output(text: &str, root: &Path, map: &SeverityMap) -> Vec<Issue> {
    let text = strip_ansi(text);
    let Some(found) = TYPE_CHECK_PATTERNS.best(&text) else {
        return Vec::new();
    };
    debug!(
        "type-check output matched {} diagnostics with the {} pattern",
        found.diagnostics.len(),
        found.pattern
    );

    found
        .diagnostics
        .into_iter()
        .map(|d| {
            let severity = map.type_check(d.level.as_deref().unwrap_or("error"));
            let fix = suggested_fix(d.code.as_deref());
            let mut issue = Issue::new(Source::TypeCheck, severity, d.message).with_fix(fix);
            if let Some(file) = d.file {
                issue = issue.at(normalize_path(root, Path::new(&file)), d.line, d.column);
            }
            if let Some(code) = d.code {
                issue = issue.with_code(code);
            }
            issue
        })
        .collect()
}

/// Runs the type checker.
pub struct TypeCheckChecker;

#[async_trait]
impl Checker for TypeCheckChecker {
    fn name(&self) -> &'static str {
        ToolKind::TypeCheck.name()
    }

    fn source(&self) -> Source {
        Source::TypeCheck
    }

    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, GuardError> {
        let spec = ctx.config.tool(ToolKind::TypeCheck);
        if !spec.enabled {
            return Ok(CheckOutcome::skipped("type-check disabled"));
        }

        let output = ctx.run_tool(&spec).await?;
        let mut outcome = CheckOutcome::from_output(self.name(), &output);
        let text = format!("{}\n{}", output.stdout, output.stderr);
        outcome.issues = parse_type_check_output(&text, &ctx.root, &ctx.config.severity);
        outcome.flag_silent_failure(Source::TypeCheck, self.name(), &ctx.config.severity);
        Ok(outcome)
    }
}
