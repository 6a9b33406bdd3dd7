//! The aggregate result of one audit run and its JSON form.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::GuardError;
use crate::issue::{BusinessConcern, Issue, Source, Suppression};
use crate::score::ScoringWeights;

/// Error and warning counts for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub error_count: usize,
    pub warning_count: usize,
}

/// Per-source counts over a set of issues. Every source has an entry.
pub fn summarize(issues: &[Issue]) -> BTreeMap<Source, SourceSummary> {
    let mut summary: BTreeMap<Source, SourceSummary> = Source::ALL
        .iter()
        .map(|s| (*s, SourceSummary::default()))
        .collect();
    for issue in issues {
        let entry = summary.entry(issue.source).or_default();
        if issue.severity.is_error() {
            entry.error_count += 1;
        } else {
            entry.warning_count += 1;
        }
    }
    summary
}

/// What a notice says about a checker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeKind {
    /// The checker did not apply; its source was not examined.
    Skipped,
    /// Tool output hit the capture limit; findings may be incomplete.
    OutputTruncated,
    /// The tool failed and nothing in its output was recognized.
    UnparsedOutput,
}

/// A fact about how a checker ran, as opposed to a finding. Lets a reader
/// tell a clean source from one that was never examined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckNotice {
    pub checker: String,
    pub kind: NoticeKind,
    pub detail: String,
}

/// Immutable result of an audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "AuditReportWire", try_from = "AuditReportWire")]
pub struct AuditReport {
    /// True iff there are no Critical or High issues.
    pub passed: bool,
    /// Sorted by severity, then location.
    pub issues: Vec<Issue>,
    pub suppressions: Vec<Suppression>,
    pub concerns: Vec<BusinessConcern>,
    pub quality_score: u8,
    pub summary: BTreeMap<Source, SourceSummary>,
    /// Skipped checkers, truncated output and unparsed failures.
    pub notices: Vec<CheckNotice>,
    pub timestamp: DateTime<Utc>,
}

impl AuditReport {
    /// Builds a report from merged checker results.
    pub fn new(
        mut issues: Vec<Issue>,
        suppressions: Vec<Suppression>,
        concerns: Vec<BusinessConcern>,
        weights: &ScoringWeights,
    ) -> Self {
        issues.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let quality_score = weights.quality_score(&issues, &suppressions);
        let summary = summarize(&issues);
        Self {
            passed: !issues.iter().any(|i| i.severity.is_error()),
            issues,
            suppressions,
            concerns,
            quality_score,
            summary,
            notices: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_notices(mut self, notices: Vec<CheckNotice>) -> Self {
        self.notices = notices;
        self
    }

    /// Notices of the given kind.
    pub fn notices_of(&self, kind: NoticeKind) -> impl Iterator<Item = &CheckNotice> {
        self.notices.iter().filter(move |n| n.kind == kind)
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity.is_warning()).count()
    }

    /// Suppressions considered unsafe.
    pub fn flagged_suppressions(&self) -> usize {
        self.suppressions.iter().filter(|s| s.should_flag).count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity.is_warning())
    }

    pub fn to_json_pretty(&self) -> Result<String, GuardError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a report, rejecting one whose totals contradict its entries.
    pub fn from_json(json: &str) -> Result<Self, GuardError> {
        serde_json::from_str(json)
            .map_err(|e| GuardError::parse(format!("invalid audit report: {}", e)))
    }

    /// Writes the pretty JSON form to `path`.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), GuardError> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

/// Stable on-disk field layout.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditReportWire {
    passed: bool,
    total_errors: usize,
    total_warnings: usize,
    total_suppressions: usize,
    errors: Vec<Issue>,
    warnings: Vec<Issue>,
    suppressions: Vec<Suppression>,
    #[serde(default)]
    concerns: Vec<BusinessConcern>,
    summary: BTreeMap<Source, SourceSummary>,
    code_quality_score: u8,
    #[serde(default)]
    notices: Vec<CheckNotice>,
    timestamp: DateTime<Utc>,
}

impl From<AuditReport> for AuditReportWire {
    fn from(report: AuditReport) -> Self {
        let (errors, warnings): (Vec<Issue>, Vec<Issue>) = report
            .issues
            .into_iter()
            .partition(|i| i.severity.is_error());
        Self {
            passed: report.passed,
            total_errors: errors.len(),
            total_warnings: warnings.len(),
            total_suppressions: report.suppressions.len(),
            errors,
            warnings,
            suppressions: report.suppressions,
            concerns: report.concerns,
            summary: report.summary,
            code_quality_score: report.quality_score,
            notices: report.notices,
            timestamp: report.timestamp,
        }
    }
}

impl TryFrom<AuditReportWire> for AuditReport {
    type Error = String;

    fn try_from(wire: AuditReportWire) -> Result<Self, Self::Error> {
        if wire.errors.len() != wire.total_errors
            || wire.warnings.len() != wire.total_warnings
            || wire.suppressions.len() != wire.total_suppressions
        {
            return Err("report totals do not match its entries".to_string());
        }
        if wire.errors.iter().any(|i| !i.severity.is_error())
            || wire.warnings.iter().any(|i| i.severity.is_error())
        {
            return Err("issue listed under the wrong severity bucket".to_string());
        }
        if wire.passed != wire.errors.is_empty() {
            return Err("passed flag contradicts the error list".to_string());
        }
        if wire.code_quality_score > 100 {
            return Err("codeQualityScore out of range".to_string());
        }

        let mut issues = wire.errors;
        issues.extend(wire.warnings);
        Ok(Self {
            passed: wire.passed,
            issues,
            suppressions: wire.suppressions,
            concerns: wire.concerns,
            quality_score: wire.code_quality_score,
            summary: wire.summary,
            notices: wire.notices,
            timestamp: wire.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Severity, SuppressionKind};
    use pretty_assertions::assert_eq;

    fn sample() -> AuditReport {
        AuditReport::new(
            vec![
                Issue::new(Source::Lint, Severity::Medium, "no-console").at("b.ts", 2, 1),
                Issue::new(Source::TypeCheck, Severity::High, "TS2322")
                    .at("a.ts", 1, 1)
                    .with_code("TS2322"),
                Issue::new(Source::Config, Severity::Critical, "bad tsconfig").at("tsconfig.json", 0, 0),
            ],
            vec![Suppression::new("a.ts", 5, SuppressionKind::IgnoreLine, None)],
            vec![BusinessConcern {
                file: "a.ts".into(),
                line: 9,
                marker: "TODO".into(),
                text: "later".into(),
            }],
            &ScoringWeights::default(),
        )
        .with_notices(vec![CheckNotice {
            checker: "dependency-audit".into(),
            kind: NoticeKind::Skipped,
            detail: "no package.json".into(),
        }])
    }

    #[test]
    fn test_counts_and_pass_flag() {
        let report = sample();
        assert!(!report.passed);
        assert_eq!(report.error_count(), 2);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.error_count() + report.warning_count(), report.issues.len());
        assert_eq!(report.flagged_suppressions(), 1);
        assert_eq!(report.summary[&Source::TypeCheck].error_count, 1);
        assert_eq!(report.summary[&Source::Build], SourceSummary::default());
    }

    #[test]
    fn test_issues_sorted_by_severity() {
        let report = sample();
        let severities: Vec<Severity> = report.issues.iter().map(|i| i.severity).collect();
        assert_eq!(severities, vec![Severity::Critical, Severity::High, Severity::Medium]);
    }

    #[test]
    fn test_warnings_only_still_passes() {
        let report = AuditReport::new(
            vec![Issue::new(Source::Lint, Severity::Low, "style")],
            vec![],
            vec![],
            &ScoringWeights::default(),
        );
        assert!(report.passed);
    }

    #[test]
    fn test_json_round_trip() {
        let report = sample();
        let json = report.to_json_pretty().unwrap();
        let parsed = AuditReport::from_json(&json).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_json_uses_stable_field_names() {
        let value: serde_json::Value =
            serde_json::from_str(&sample().to_json_pretty().unwrap()).unwrap();
        for key in [
            "passed",
            "totalErrors",
            "totalWarnings",
            "totalSuppressions",
            "errors",
            "warnings",
            "suppressions",
            "summary",
            "codeQualityScore",
            "notices",
            "timestamp",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["notices"][0]["kind"], "skipped");
        assert_eq!(value["totalErrors"], 2);
        assert_eq!(value["summary"]["typeCheck"]["errorCount"], 1);
    }

    #[test]
    fn test_inconsistent_totals_are_rejected() {
        let mut value: serde_json::Value =
            serde_json::from_str(&sample().to_json_pretty().unwrap()).unwrap();
        value["totalErrors"] = 7.into();
        let err = AuditReport::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, GuardError::ParseFailure(_)));
    }
}
