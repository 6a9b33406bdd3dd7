//! Concurrent fan-out over every checker.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, error, info};

use crate::GuardError;
use crate::checkers::{
    CheckContext, CheckOutcome, CheckSignal, Checker, default_checkers, run_isolated,
};
use crate::issue::{Issue, SYNTHETIC_CODE_PREFIX, dedupe_issues};
use crate::report::{AuditReport, CheckNotice, NoticeKind};

/// Runs all checkers concurrently and merges their results.
pub struct IssueAggregator {
    checkers: Vec<Arc<dyn Checker>>,
    ctx: CheckContext,
}

impl IssueAggregator {
    /// Creates an aggregator with the standard checkers.
    pub fn new(ctx: CheckContext) -> Self {
        Self::with_checkers(ctx, default_checkers())
    }

    pub fn with_checkers(ctx: CheckContext, checkers: Vec<Arc<dyn Checker>>) -> Self {
        Self { checkers, ctx }
    }

    pub fn context(&self) -> &CheckContext {
        &self.ctx
    }

    /// Runs every checker and builds a report.
    ///
    /// Waits for all checkers; a failing or panicking checker becomes a
    /// synthetic issue. Only a fault in the task runtime itself is returned
    /// as an error.
    pub async fn audit(&self) -> Result<AuditReport, GuardError> {
        let start = Instant::now();

        let handles = self.checkers.iter().map(|checker| {
            let checker = Arc::clone(checker);
            let ctx = self.ctx.clone();
            tokio::spawn(async move { run_isolated(checker.as_ref(), &ctx).await })
        });
        let joined = join_all(handles).await;

        let mut issues = Vec::new();
        let mut suppressions = Vec::new();
        let mut concerns = Vec::new();
        let mut notices = Vec::new();

        for (checker, result) in self.checkers.iter().zip(joined) {
            let mut outcome = match result {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    error!("{} checker panicked", checker.name());
                    panicked(checker.as_ref(), &self.ctx)
                }
                Err(e) => {
                    return Err(GuardError::Internal(format!(
                        "{} checker task failed: {}",
                        checker.name(),
                        e
                    )));
                }
            };
            dedupe_issues(&mut outcome.issues);
            issues.append(&mut outcome.issues);
            suppressions.append(&mut outcome.suppressions);
            concerns.append(&mut outcome.concerns);
            notices.extend(
                outcome
                    .signals
                    .into_iter()
                    .map(|signal| notice(checker.name(), signal)),
            );
        }

        let report = AuditReport::new(issues, suppressions, concerns, &self.ctx.config.scoring)
            .with_notices(notices);
        info!(
            "Audit finished in {:?}: {} error(s), {} warning(s), score {}",
            start.elapsed(),
            report.error_count(),
            report.warning_count(),
            report.quality_score
        );
        Ok(report)
    }
}

fn notice(checker: &str, signal: CheckSignal) -> CheckNotice {
    let (kind, detail) = match signal {
        CheckSignal::Skipped { reason } => (NoticeKind::Skipped, reason),
        CheckSignal::OutputTruncated { tool } => (
            NoticeKind::OutputTruncated,
            format!("{} output exceeded the capture limit", tool),
        ),
        CheckSignal::ParserProducedNothing { tool, exit_code } => (
            NoticeKind::UnparsedOutput,
            format!("{} exited with {} and no diagnostics were recognized", tool, exit_code),
        ),
    };
    debug!("{}: {}", checker, detail);
    CheckNotice {
        checker: checker.to_string(),
        kind,
        detail,
    }
}

fn panicked(checker: &dyn Checker, ctx: &CheckContext) -> CheckOutcome {
    CheckOutcome {
        issues: vec![
            Issue::new(
                checker.source(),
                ctx.config.severity.tool_failure,
                format!("Could not check {}: checker crashed", checker.name()),
            )
            .with_code(format!("{SYNTHETIC_CODE_PREFIX}check-failed")),
        ],
        ..Default::default()
    }
}
