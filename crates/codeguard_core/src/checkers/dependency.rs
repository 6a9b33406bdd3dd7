use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::{CheckContext, CheckOutcome, Checker, parse_json_candidates};
use crate::config::ToolKind;
use crate::error::GuardError;
use crate::issue::{Issue, Source};
use crate::severity::SeverityMap;

const MANIFEST: &str = "package.json";

/// What an audit report said.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditFindings {
    Issues(Vec<Issue>),
    /// The audit tool reported it could not run (e.g. no lockfile).
    ToolError(String),
}

fn fix_hint(package: &str, fix: Option<&Value>) -> String {
    match fix {
        Some(Value::Bool(true)) => "Run `npm audit fix`".to_string(),
        Some(Value::Object(target)) => {
            let name = target.get("name").and_then(Value::as_str).unwrap_or(package);
            let version = target.get("version").and_then(Value::as_str).unwrap_or("latest");
            let major = target
                .get("isSemVerMajor")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if major {
                format!("Upgrade {} to {} (breaking change)", name, version)
            } else {
                format!("Upgrade {} to {}", name, version)
            }
        }
        _ => format!("No fix available; consider replacing {}", package),
    }
}

fn advisory_title(via: Option<&Value>) -> Option<String> {
    via?.as_array()?
        .iter()
        .find_map(|v| v.get("title").and_then(Value::as_str))
        .map(str::to_string)
}

fn dependency_issue(
    package: &str,
    severity: &str,
    detail: &str,
    fix: String,
    map: &SeverityMap,
) -> Issue {
    Issue::new(
        Source::Dependency,
        map.dependency(severity),
        format!("{} ({}): {}", package, severity, detail),
    )
    .at(MANIFEST, 0, 0)
    .with_code(format!("audit:{}", package))
    .with_fix(fix)
}

/// Current report shape: `vulnerabilities` keyed by package.
fn from_vulnerabilities(vulns: &serde_json::Map<String, Value>, map: &SeverityMap) -> Vec<Issue> {
    vulns
        .iter()
        .map(|(package, entry)| {
            let severity = entry
                .get("severity")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let range = entry.get("range").and_then(Value::as_str).unwrap_or("*");
            let detail = advisory_title(entry.get("via"))
                .unwrap_or_else(|| format!("vulnerable via dependencies in range {}", range));
            let fix = fix_hint(package, entry.get("fixAvailable"));
            dependency_issue(package, severity, &detail, fix, map)
        })
        .collect()
}

/// Legacy report shape: `advisories` keyed by advisory id.
fn from_advisories(advisories: &serde_json::Map<String, Value>, map: &SeverityMap) -> Vec<Issue> {
    advisories
        .values()
        .map(|entry| {
            let field = |name: &str, default: &'static str| {
                entry.get(name).and_then(Value::as_str).unwrap_or(default)
            };
            let package = field("module_name", "unknown");
            let severity = field("severity", "unknown");
            let title = field("title", "advisory");
            let fix = entry
                .get("recommendation")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| fix_hint(package, None));
            dependency_issue(package, severity, title, fix, map)
        })
        .collect()
}

/// Only totals are present: one issue per non-zero severity level.
fn from_counts(counts: &serde_json::Map<String, Value>, map: &SeverityMap) -> Vec<Issue> {
    ["critical", "high", "moderate", "low", "info"]
        .iter()
        .filter_map(|level| {
            let n = counts.get(*level).and_then(Value::as_u64).filter(|n| *n > 0)?;
            let noun = if n == 1 { "vulnerability" } else { "vulnerabilities" };
            Some(
                Issue::new(
                    Source::Dependency,
                    map.dependency(level),
                    format!("{} {} severity {}", n, level, noun),
                )
                .at(MANIFEST, 0, 0)
                .with_code(format!("audit:{}", level))
                .with_fix("Run `npm audit` for details"),
            )
        })
        .collect()
}

/// Interprets package audit JSON. Returns `None` if the output is not an
/// audit report.
pub fn parse_audit_output(stdout: &str, map: &SeverityMap) -> Option<AuditFindings> {
    let report: serde_json::Map<String, Value> = parse_json_candidates(&[stdout])?;

    if let Some(error) = report.get("error") {
        let summary = error
            .get("summary")
            .or_else(|| error.get("code"))
            .and_then(Value::as_str)
            .unwrap_or("audit failed");
        return Some(AuditFindings::ToolError(summary.to_string()));
    }

    if let Some(vulns) = report.get("vulnerabilities").and_then(Value::as_object) {
        return Some(AuditFindings::Issues(from_vulnerabilities(vulns, map)));
    }
    if let Some(advisories) = report.get("advisories").and_then(Value::as_object) {
        return Some(AuditFindings::Issues(from_advisories(advisories, map)));
    }
    let counts = report
        .get("metadata")
        .and_then(|m| m.get("vulnerabilities"))
        .and_then(Value::as_object)?;
    Some(AuditFindings::Issues(from_counts(counts, map)))
}

/// Audits installed packages for known vulnerabilities.
pub struct DependencyChecker;

#[async_trait]
impl Checker for DependencyChecker {
    fn name(&self) -> &'static str {
        ToolKind::DependencyAudit.name()
    }

    fn source(&self) -> Source {
        Source::Dependency
    }

    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, GuardError> {
        if !ctx.root.join(MANIFEST).is_file() {
            return Ok(CheckOutcome::skipped("no package.json"));
        }
        let spec = ctx.config.tool(ToolKind::DependencyAudit);
        if !spec.enabled {
            return Ok(CheckOutcome::skipped("dependency audit disabled"));
        }

        let output = ctx.run_tool(&spec).await?;
        let mut outcome = CheckOutcome::from_output(self.name(), &output);
        match parse_audit_output(&output.stdout, &ctx.config.severity) {
            Some(AuditFindings::Issues(issues)) => outcome.issues = issues,
            Some(AuditFindings::ToolError(reason)) => {
                info!("Skipping dependency audit: {}", reason);
                let mut skipped = CheckOutcome::skipped(reason);
                skipped.exit_code = outcome.exit_code;
                return Ok(skipped);
            }
            None => {
                debug!("dependency audit output not recognized");
                outcome.flag_silent_failure(Source::Dependency, self.name(), &ctx.config.severity);
            }
        }
        Ok(outcome)
    }
}
