//! Text output formatter

use codeguard_core::{AuditReport, CountOrigin, Decision, ErrorCounts, Issue, OverrideStatus};

fn location(issue: &Issue) -> String {
    if issue.file.as_os_str().is_empty() {
        "-".to_string()
    } else if issue.line == 0 {
        issue.file.display().to_string()
    } else {
        format!("{}:{}:{}", issue.file.display(), issue.line, issue.column)
    }
}

fn print_issue(issue: &Issue) {
    let code = issue.code.as_deref().unwrap_or("-");
    println!(
        "  {} {} [{}/{}]: {}",
        location(issue),
        issue.severity,
        issue.source,
        code,
        issue.message
    );
}

pub fn output_report(report: &AuditReport) {
    let errors: Vec<&Issue> = report.errors().collect();
    let warnings: Vec<&Issue> = report.warnings().collect();

    if !errors.is_empty() {
        println!("\nErrors:");
        errors.iter().for_each(|i| print_issue(i));
    }
    if !warnings.is_empty() {
        println!("\nWarnings:");
        warnings.iter().for_each(|i| print_issue(i));
    }

    let flagged: Vec<_> = report.suppressions.iter().filter(|s| s.should_flag).collect();
    if !flagged.is_empty() {
        println!("\nUnsafe suppressions:");
        for s in flagged {
            println!("  {}:{} {:?}", s.file.display(), s.line, s.kind);
        }
    }

    if !report.concerns.is_empty() {
        println!("\nConcerns:");
        for c in &report.concerns {
            println!("  {}:{} {}: {}", c.file.display(), c.line, c.marker, c.text);
        }
    }

    if !report.notices.is_empty() {
        println!("\nNotices:");
        for n in &report.notices {
            println!("  {}: {}", n.checker, n.detail);
        }
    }

    println!();
    println!("{:<12} | {:>6} | {:>8}", "Source", "Errors", "Warnings");
    println!("{:-<12}-+-{:->6}-+-{:->8}", "", "", "");
    for (source, summary) in &report.summary {
        println!(
            "{:<12} | {:>6} | {:>8}",
            source.to_string(),
            summary.error_count,
            summary.warning_count
        );
    }
    println!();
    println!(
        "{}: {} error(s), {} warning(s), {} suppression(s) ({} unsafe), quality score {}",
        if report.passed { "Passed" } else { "Failed" },
        report.error_count(),
        report.warning_count(),
        report.suppressions.len(),
        report.flagged_suppressions(),
        report.quality_score
    );
}

fn origin(origin: CountOrigin) -> &'static str {
    match origin {
        CountOrigin::Tool => "tool",
        CountOrigin::Editor => "editor",
    }
}

pub fn output_counts(counts: &ErrorCounts) {
    println!(
        "type-check: {} error(s), {} warning(s) (from {})",
        counts.type_errors,
        counts.type_warnings,
        origin(counts.type_origin)
    );
    println!(
        "lint: {} error(s), {} warning(s) (from {})",
        counts.lint_errors,
        counts.lint_warnings,
        origin(counts.lint_origin)
    );
    for tool in counts.unverified_tools() {
        println!("warning: {} failed without reporting diagnostics; its counts are unverified", tool);
    }
    if counts.suspicious_zero {
        println!("warning: a tool failed without reporting diagnostics; counts are unverified");
    }
}

pub fn output_decision(decision: &Decision) {
    println!("{}", decision.reason);
    match decision.override_status {
        OverrideStatus::Available => {
            println!("Re-run with --override to commit anyway.");
        }
        OverrideStatus::Honored => println!("Override honored."),
        OverrideStatus::Rejected => println!("Override not permitted here."),
        OverrideStatus::NotApplicable => {}
    }
}
