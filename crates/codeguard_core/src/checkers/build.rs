use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use tracing::debug;

use super::patterns::{PatternSet, RawDiagnostic, strip_ansi};
use super::{CheckContext, CheckOutcome, Checker, normalize_path};
use crate::config::ToolKind;
use crate::error::GuardError;
use crate::issue::{Issue, Source};
use crate::severity::SeverityMap;

const POSITIONAL: &[(&str, &str)] = &[
    (
        "paren",
        r"(?m)^(?P<file>[^\s(][^(\n]*?)\((?P<line>\d+),(?P<col>\d+)\):\s+(?P<level>error|warning)\s*(?P<code>[A-Z]+\d+)?:\s*(?P<message>.+)$",
    ),
    (
        "positional",
        r"(?m)^(?P<file>[^\s:][^:\n]*?):(?P<line>\d+):(?P<col>\d+):?\s+(?:-\s+)?(?P<level>error|warning)\b:?\s*(?:(?P<code>[A-Z]+\d+):\s*)?(?P<message>.+)$",
    ),
    // ERROR in ./src/index.ts 3:7
    (
        "bundler",
        r"(?m)^(?P<level>ERROR|WARNING) in (?P<message>.+)$",
    ),
];

// Line-leading error tokens: `error: ...`, `ERROR: ...`, `[ERROR] ...`.
const FREE_FORM: (&str, &str) = (
    "token",
    r"(?m)^\s*\[?(?P<level>ERROR|Error|error)\]?:?\s+(?P<message>.+)$",
);

static STRICT_PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| PatternSet::new(POSITIONAL));

static ALL_PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| {
    let mut specs = POSITIONAL.to_vec();
    specs.push(FREE_FORM);
    PatternSet::new(&specs)
});

/// Parses build log text into issues.
///
/// Free-form `error` lines are only considered when the build failed; a
/// successful build log routinely mentions errors it handled.
pub fn parse_build_output(
    text: &str,
    failed: bool,
    source: Source,
    root: &Path,
    map: &SeverityMap,
) -> Vec<Issue> {
    let text = strip_ansi(text);
    let patterns = if failed { &*ALL_PATTERNS } else { &*STRICT_PATTERNS };
    let Some(found) = patterns.best(&text) else {
        return Vec::new();
    };
    debug!(
        "{} output matched {} diagnostics with the {} pattern",
        source,
        found.diagnostics.len(),
        found.pattern
    );
    found
        .diagnostics
        .into_iter()
        .map(|d| to_issue(d, source, root, map))
        .collect()
}

fn to_issue(d: RawDiagnostic, source: Source, root: &Path, map: &SeverityMap) -> Issue {
    let severity = map.build(d.level.as_deref().unwrap_or("error"));
    let mut issue = Issue::new(source, severity, d.message)
        .with_fix(format!("Fix the {} failure and rebuild", source));
    if let Some(file) = d.file {
        issue = issue.at(normalize_path(root, Path::new(&file)), d.line, d.column);
    }
    if let Some(code) = d.code {
        issue = issue.with_code(code);
    }
    issue
}

/// Runs the project build.
pub struct BuildChecker;

#[async_trait]
impl Checker for BuildChecker {
    fn name(&self) -> &'static str {
        ToolKind::Build.name()
    }

    fn source(&self) -> Source {
        Source::Build
    }

    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, GuardError> {
        let spec = ctx.config.tool(ToolKind::Build);
        if !spec.enabled {
            return Ok(CheckOutcome::skipped("build disabled"));
        }

        let output = ctx.run_tool(&spec).await?;
        let mut outcome = CheckOutcome::from_output(self.name(), &output);
        let text = format!("{}\n{}", output.stdout, output.stderr);
        outcome.issues = parse_build_output(
            &text,
            !output.success(),
            Source::Build,
            &ctx.root,
            &ctx.config.severity,
        );
        outcome.flag_silent_failure(Source::Build, self.name(), &ctx.config.severity);
        Ok(outcome)
    }
}
