//! Fast error counting for frequent polling.
//!
//! Only the type checker and the linter run. When either tool cannot be
//! spawned, the editor's own diagnostics stand in for it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::GuardError;
use crate::checkers::{CheckContext, CheckOutcome, Checker, LintChecker, TypeCheckChecker};
use crate::diagnostics::EditorDiagnostics;
use crate::issue::{Issue, Source};

/// Where a count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CountOrigin {
    Tool,
    Editor,
}

/// Error and warning counts for the two fast-path tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCounts {
    pub type_errors: usize,
    pub type_warnings: usize,
    pub lint_errors: usize,
    pub lint_warnings: usize,
    pub type_origin: CountOrigin,
    pub lint_origin: CountOrigin,
    /// The type checker failed and none of its output could be parsed, so
    /// `type_errors` and `type_warnings` are not real counts.
    pub type_unverified: bool,
    pub lint_unverified: bool,
    /// Every count is zero although a tool exited with a failure code.
    pub suspicious_zero: bool,
}

impl ErrorCounts {
    pub fn errors(&self) -> usize {
        self.type_errors + self.lint_errors
    }

    pub fn warnings(&self) -> usize {
        self.type_warnings + self.lint_warnings
    }

    /// True when every tool's counts came from parsed output.
    pub fn is_verified(&self) -> bool {
        !(self.suspicious_zero || self.type_unverified || self.lint_unverified)
    }

    /// Names of the tools whose counts could not be verified.
    pub fn unverified_tools(&self) -> Vec<&'static str> {
        let mut tools = Vec::new();
        if self.type_unverified {
            tools.push(Source::TypeCheck.as_str());
        }
        if self.lint_unverified {
            tools.push(Source::Lint.as_str());
        }
        tools
    }

    /// Zero errors and warnings that can be trusted.
    pub fn is_clean(&self) -> bool {
        self.errors() == 0 && self.warnings() == 0 && self.is_verified()
    }
}

struct Tally {
    errors: usize,
    warnings: usize,
    origin: CountOrigin,
    failed_exit: bool,
    unverified: bool,
}

impl Tally {
    fn from_issues<'a>(issues: impl Iterator<Item = &'a Issue>, origin: CountOrigin) -> Self {
        let (mut errors, mut warnings) = (0, 0);
        for issue in issues.filter(|i| !i.is_synthetic()) {
            if issue.severity.is_error() {
                errors += 1;
            } else {
                warnings += 1;
            }
        }
        Self {
            errors,
            warnings,
            origin,
            failed_exit: false,
            unverified: false,
        }
    }
}

/// Resets the in-flight flag when a count finishes or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ErrorCounter {
    ctx: CheckContext,
    editor: Option<Arc<dyn EditorDiagnostics>>,
    in_flight: AtomicBool,
}

impl ErrorCounter {
    pub fn new(ctx: CheckContext, editor: Option<Arc<dyn EditorDiagnostics>>) -> Self {
        Self {
            ctx,
            editor,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Number of files in scope; used to tell new projects from legacy ones.
    pub fn project_file_count(&self) -> usize {
        self.ctx.files.len()
    }

    /// Counts type and lint findings.
    ///
    /// Fails only when a tool could not run and there are no editor
    /// diagnostics to fall back to.
    pub async fn count(&self) -> Result<ErrorCounts, GuardError> {
        let (type_result, lint_result) = tokio::join!(
            TypeCheckChecker.check(&self.ctx),
            LintChecker.check(&self.ctx)
        );
        let types = self.tally(Source::TypeCheck, type_result)?;
        let lint = self.tally(Source::Lint, lint_result)?;

        let all_zero = types.errors + types.warnings + lint.errors + lint.warnings == 0;
        let suspicious_zero = all_zero && (types.failed_exit || lint.failed_exit);
        if suspicious_zero {
            warn!("All counts are zero but a tool exited with a failure code; treating as unverified");
        }
        if types.unverified || lint.unverified {
            warn!("A tool failed without reporting diagnostics; its counts are unverified");
        }

        Ok(ErrorCounts {
            type_errors: types.errors,
            type_warnings: types.warnings,
            lint_errors: lint.errors,
            lint_warnings: lint.warnings,
            type_origin: types.origin,
            lint_origin: lint.origin,
            type_unverified: types.unverified,
            lint_unverified: lint.unverified,
            suspicious_zero,
        })
    }

    fn tally(
        &self,
        source: Source,
        result: Result<CheckOutcome, GuardError>,
    ) -> Result<Tally, GuardError> {
        match result {
            Ok(outcome) => {
                let mut tally = Tally::from_issues(outcome.issues.iter(), CountOrigin::Tool);
                tally.failed_exit = outcome.exit_code.is_some_and(|code| code != 0);
                tally.unverified = outcome.parser_produced_nothing();
                Ok(tally)
            }
            Err(e) if e.is_tool_failure() => match &self.editor {
                Some(editor) => {
                    debug!("{} unavailable ({}), using editor diagnostics", source, e);
                    let issues = editor.all();
                    Ok(Tally::from_issues(
                        issues.iter().filter(|i| i.source == source),
                        CountOrigin::Editor,
                    ))
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Counts unless a count is already running, in which case the request
    /// is dropped and `None` returned.
    pub async fn poll(&self) -> Option<Result<ErrorCounts, GuardError>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Count already in flight, dropping poll");
            return None;
        }
        let _guard = InFlight(&self.in_flight);
        Some(self.count().await)
    }

    /// Polls on a fixed interval and whenever `trigger` is notified, sending
    /// each completed count to `tx`. Stops when the receiver is dropped.
    pub fn spawn_polling(
        self: Arc<Self>,
        interval: Duration,
        trigger: Arc<Notify>,
        tx: mpsc::Sender<ErrorCounts>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                    _ = trigger.notified() => {}
                }

                let counter = Arc::clone(&self);
                let tx = tx.clone();
                tokio::spawn(async move {
                    match counter.poll().await {
                        Some(Ok(counts)) => {
                            let _ = tx.send(counts).await;
                        }
                        Some(Err(e)) => warn!("Background count failed: {}", e),
                        None => {}
                    }
                });
            }
            debug!("Polling stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardConfig;
    use crate::diagnostics::InMemoryDiagnostics;
    use crate::issue::Severity;
    use crate::test_utils::ScriptedRunner;
    use pretty_assertions::assert_eq;

    const TSC: &str = "src/a.ts(1,1): error TS2304: Cannot find name 'x'.\n\
                       src/a.ts(2,1): error TS2304: Cannot find name 'y'.\n";
    const ESLINT: &str = r#"[{"filePath": "src/a.ts", "messages": [
        {"ruleId": "no-console", "severity": 1, "message": "console", "line": 3, "column": 1}
    ]}]"#;

    fn counter(runner: ScriptedRunner, editor: Option<Arc<dyn EditorDiagnostics>>) -> ErrorCounter {
        let ctx = CheckContext::with_files(".", GuardConfig::new(), Arc::new(runner), vec![]);
        ErrorCounter::new(ctx, editor)
    }

    #[tokio::test]
    async fn test_counts_from_tools() {
        let runner = ScriptedRunner::new()
            .respond("npx tsc", 2, TSC, "")
            .respond("npx eslint", 1, ESLINT, "");
        let counts = counter(runner, None).count().await.unwrap();
        assert_eq!(counts.type_errors, 2);
        assert_eq!(counts.lint_warnings, 1);
        assert_eq!(counts.errors(), 2);
        assert_eq!(counts.type_origin, CountOrigin::Tool);
        assert!(!counts.suspicious_zero);
    }

    #[tokio::test]
    async fn test_failed_exit_with_nothing_parsed_is_suspicious() {
        let runner = ScriptedRunner::new()
            .respond("npx tsc", 0, "", "")
            .respond("npx eslint", 2, "", "Oops! Something went wrong!");
        let counts = counter(runner, None).count().await.unwrap();
        assert_eq!(counts.errors() + counts.warnings(), 0);
        assert!(counts.suspicious_zero);
        assert!(counts.lint_unverified);
        assert!(!counts.is_clean());
    }

    #[tokio::test]
    async fn test_crashed_type_checker_is_not_hidden_by_lint_warnings() {
        let runner = ScriptedRunner::new()
            .respond("npx tsc", 2, "", "FATAL ERROR: Reached heap limit")
            .respond("npx eslint", 1, ESLINT, "");
        let counts = counter(runner, None).count().await.unwrap();
        assert_eq!(counts.type_errors, 0);
        assert_eq!(counts.lint_warnings, 1);
        assert!(!counts.suspicious_zero);
        assert!(counts.type_unverified);
        assert!(!counts.lint_unverified);
        assert!(!counts.is_verified());
        assert_eq!(counts.unverified_tools(), vec!["type-check"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_editor_diagnostics() {
        let editor = Arc::new(InMemoryDiagnostics::new());
        editor.set(
            "src/a.ts",
            vec![
                Issue::new(Source::TypeCheck, Severity::High, "x").at("src/a.ts", 1, 1),
                Issue::new(Source::Lint, Severity::Medium, "y").at("src/a.ts", 2, 1),
            ],
        );
        let runner = ScriptedRunner::new()
            .unavailable("npx tsc")
            .respond("npx eslint", 0, "[]", "");
        let counts = counter(runner, Some(editor)).count().await.unwrap();
        assert_eq!(counts.type_errors, 1);
        assert_eq!(counts.type_origin, CountOrigin::Editor);
        assert_eq!(counts.lint_warnings, 0);
        assert_eq!(counts.lint_origin, CountOrigin::Tool);
    }

    #[tokio::test]
    async fn test_unavailable_without_editor_is_an_error() {
        let runner = ScriptedRunner::new().unavailable("npx tsc");
        let err = counter(runner, None).count().await.unwrap_err();
        assert!(err.is_tool_failure());
    }

    #[tokio::test]
    async fn test_overlapping_poll_is_dropped() {
        let runner = ScriptedRunner::new().with_delay(Duration::from_millis(50));
        let counter = counter(runner, None);
        let (first, second) = tokio::join!(counter.poll(), counter.poll());
        assert!(first.is_some());
        assert!(second.is_none());
        assert!(counter.poll().await.is_some());
    }

    #[tokio::test]
    async fn test_polling_delivers_counts_and_stops() {
        let runner = ScriptedRunner::new().respond("npx tsc", 2, TSC, "");
        let counter = Arc::new(counter(runner, None));
        let trigger = Arc::new(Notify::new());
        let (tx, mut rx) = mpsc::channel(4);

        let handle = Arc::clone(&counter).spawn_polling(Duration::from_secs(3600), trigger, tx);
        let counts = rx.recv().await.unwrap();
        assert_eq!(counts.type_errors, 2);

        drop(rx);
        handle.await.unwrap();
    }
}
