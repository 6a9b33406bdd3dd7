//! Protection policy: project classification and per-trigger decisions.
//!
//! The policy is either disabled or enabled with an [`EnforcementLevel`] and
//! a [`ProjectClass`] computed once by [`ProtectionPolicy::enable`].
//! Decisions are a pure function of (level, class, trigger, counts); see
//! [`judge`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::GuardError;
use crate::aggregator::IssueAggregator;
use crate::counter::{ErrorCounter, ErrorCounts};
use crate::diagnostics::EditorDiagnostics;
use crate::issue::{Issue, Source};
use crate::report::{AuditReport, SourceSummary, summarize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnforcementLevel {
    /// Errors block; warnings do not.
    Advisory,
    /// Errors and warnings both block.
    ZeroTolerance,
}

impl EnforcementLevel {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::ZeroTolerance
        } else {
            Self::Advisory
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectClass {
    /// Clean and small.
    New,
    /// Clean but established.
    Legacy,
    /// Already has errors or warnings.
    LegacyWithErrors,
    /// Classification did not complete.
    Unknown,
}

impl ProjectClass {
    /// Classes whose advisory commits may be overridden. `Unknown` is
    /// treated like `LegacyWithErrors`, never like `New`.
    fn allows_override(&self) -> bool {
        matches!(self, Self::LegacyWithErrors | Self::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum PolicyState {
    Disabled,
    Enabled {
        level: EnforcementLevel,
        class: ProjectClass,
    },
}

/// Lifecycle event a decision is requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A file is being saved. Answered from editor diagnostics only.
    Save(PathBuf),
    /// A commit. `override_confirmed` is the caller's answer to an offered
    /// override.
    Commit { override_confirmed: bool },
    Build,
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Save(_) => TriggerKind::Save,
            Trigger::Commit { .. } => TriggerKind::Commit,
            Trigger::Build => TriggerKind::Build,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    Save,
    Commit,
    Build,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerKind::Save => "Save",
            TriggerKind::Commit => "Commit",
            TriggerKind::Build => "Build",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverrideStatus {
    NotApplicable,
    /// The commit was denied but the caller may confirm an override.
    Available,
    /// The caller confirmed and the commit was allowed with a warning.
    Honored,
    /// The caller asked for an override this situation does not permit.
    Rejected,
}

/// Counts a decision is based on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub errors: usize,
    pub warnings: usize,
    /// Unsafe suppressions.
    pub suppressions: usize,
    pub details: BTreeMap<Source, SourceSummary>,
}

impl Tally {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let details = summarize(issues);
        Self {
            errors: details.values().map(|s| s.error_count).sum(),
            warnings: details.values().map(|s| s.warning_count).sum(),
            suppressions: 0,
            details,
        }
    }

    pub fn from_report(report: &AuditReport) -> Self {
        Self {
            errors: report.error_count(),
            warnings: report.warning_count(),
            suppressions: report.flagged_suppressions(),
            details: report.summary.clone(),
        }
    }

    pub fn from_counts(counts: &ErrorCounts) -> Self {
        let mut details = summarize(&[]);
        details.insert(
            Source::TypeCheck,
            SourceSummary {
                error_count: counts.type_errors,
                warning_count: counts.type_warnings,
            },
        );
        details.insert(
            Source::Lint,
            SourceSummary {
                error_count: counts.lint_errors,
                warning_count: counts.lint_warnings,
            },
        );
        Self {
            errors: counts.errors(),
            warnings: counts.warnings(),
            suppressions: 0,
            details,
        }
    }

    fn breakdown(&self, with_suppressions: bool) -> String {
        let mut text = format!("{} error(s), {} warning(s)", self.errors, self.warnings);
        if with_suppressions {
            text.push_str(&format!(", {} unsafe suppression(s)", self.suppressions));
        }
        let per_source: Vec<String> = self
            .details
            .iter()
            .filter(|(_, s)| s.error_count + s.warning_count > 0)
            .map(|(source, s)| {
                format!(
                    "{}: {} error(s), {} warning(s)",
                    source, s.error_count, s.warning_count
                )
            })
            .collect();
        if !per_source.is_empty() {
            text.push_str(&format!(" [{}]", per_source.join("; ")));
        }
        text
    }
}

/// Outcome of [`judge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub reason: String,
    pub override_status: OverrideStatus,
}

/// Decides one trigger for an enabled policy.
pub fn judge(
    level: EnforcementLevel,
    class: ProjectClass,
    trigger: TriggerKind,
    tally: &Tally,
    override_confirmed: bool,
) -> Verdict {
    let is_commit = trigger == TriggerKind::Commit;
    let breakdown = tally.breakdown(is_commit);
    let verdict = |allowed: bool, reason: String, override_status| Verdict {
        allowed,
        reason,
        override_status,
    };
    let not_applicable = if override_confirmed {
        OverrideStatus::Rejected
    } else {
        OverrideStatus::NotApplicable
    };

    let blocked = match level {
        EnforcementLevel::ZeroTolerance => {
            tally.errors > 0 || tally.warnings > 0 || (is_commit && tally.suppressions > 0)
        }
        EnforcementLevel::Advisory => tally.errors > 0,
    };

    if is_commit && level == EnforcementLevel::Advisory {
        if class == ProjectClass::New {
            return verdict(
                true,
                format!("{trigger} allowed: new project, protection applies gradually ({breakdown})"),
                not_applicable,
            );
        }
        if blocked && class.allows_override() {
            return if override_confirmed {
                verdict(
                    true,
                    format!("{trigger} allowed with override: {breakdown}"),
                    OverrideStatus::Honored,
                )
            } else {
                verdict(
                    false,
                    format!("{trigger} blocked: {breakdown}"),
                    OverrideStatus::Available,
                )
            };
        }
    }

    if blocked {
        verdict(false, format!("{trigger} blocked: {breakdown}"), not_applicable)
    } else {
        verdict(true, format!("{trigger} allowed: {breakdown}"), not_applicable)
    }
}

/// Result of [`ProtectionPolicy::decide`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub trigger: TriggerKind,
    pub allowed: bool,
    pub reason: String,
    pub errors: usize,
    pub warnings: usize,
    pub suppressions: usize,
    pub details: BTreeMap<Source, SourceSummary>,
    pub override_status: OverrideStatus,
}

impl Decision {
    fn from_verdict(trigger: TriggerKind, verdict: Verdict, tally: Tally) -> Self {
        Self {
            trigger,
            allowed: verdict.allowed,
            reason: verdict.reason,
            errors: tally.errors,
            warnings: tally.warnings,
            suppressions: tally.suppressions,
            details: tally.details,
            override_status: verdict.override_status,
        }
    }

    fn allow(trigger: TriggerKind, reason: impl Into<String>) -> Self {
        Self::from_verdict(
            trigger,
            Verdict {
                allowed: true,
                reason: reason.into(),
                override_status: OverrideStatus::NotApplicable,
            },
            Tally::default(),
        )
    }

    /// Deny-by-default when the counts could not be obtained.
    fn deny_unverified(trigger: TriggerKind, err: &GuardError) -> Self {
        Self::from_verdict(
            trigger,
            Verdict {
                allowed: false,
                reason: format!("{trigger} blocked: could not verify the project ({err})"),
                override_status: OverrideStatus::NotApplicable,
            },
            Tally::default(),
        )
    }
}

/// Published on every transition and decision.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyEvent {
    Enabled {
        level: EnforcementLevel,
        class: ProjectClass,
    },
    Disabled,
    Decided(Decision),
}

/// Owns the policy state of one workspace.
///
/// Transitions are serialized; decisions read a snapshot of the state and
/// may run concurrently.
pub struct ProtectionPolicy {
    state: RwLock<PolicyState>,
    transition: Mutex<()>,
    counter: Arc<ErrorCounter>,
    aggregator: Arc<IssueAggregator>,
    editor: Arc<dyn EditorDiagnostics>,
    events: broadcast::Sender<PolicyEvent>,
}

impl ProtectionPolicy {
    pub fn new(
        counter: Arc<ErrorCounter>,
        aggregator: Arc<IssueAggregator>,
        editor: Arc<dyn EditorDiagnostics>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: RwLock::new(PolicyState::Disabled),
            transition: Mutex::new(()),
            counter,
            aggregator,
            editor,
            events,
        }
    }

    pub fn state(&self) -> PolicyState {
        *self.state.read()
    }

    /// Subscribes to policy events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<PolicyEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: PolicyEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Classifies the project and enables protection.
    pub async fn enable(&self, strict: bool) -> PolicyState {
        let _transition = self.transition.lock().await;
        let level = EnforcementLevel::from_strict(strict);
        let class = self.classify().await;
        let state = PolicyState::Enabled { level, class };
        *self.state.write() = state;
        info!("Protection enabled: {:?}, project class {:?}", level, class);
        self.publish(PolicyEvent::Enabled { level, class });
        state
    }

    /// Disables protection and discards the classification.
    pub async fn disable(&self) {
        let _transition = self.transition.lock().await;
        *self.state.write() = PolicyState::Disabled;
        info!("Protection disabled");
        self.publish(PolicyEvent::Disabled);
    }

    async fn classify(&self) -> ProjectClass {
        let counts = match self.counter.count().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!("{}", GuardError::ClassificationFailure(e.to_string()));
                return ProjectClass::Unknown;
            }
        };
        if !counts.is_verified() {
            warn!(
                "{}",
                GuardError::ClassificationFailure("tool failed without reporting diagnostics".into())
            );
            return ProjectClass::Unknown;
        }
        if counts.errors() + counts.warnings() > 0 {
            return ProjectClass::LegacyWithErrors;
        }

        let files = self.counter.project_file_count();
        let threshold = self.aggregator.context().config.new_project_file_threshold;
        debug!("Clean project with {} file(s), threshold {}", files, threshold);
        if files < threshold {
            ProjectClass::New
        } else {
            ProjectClass::Legacy
        }
    }

    /// Decides whether a trigger may proceed.
    pub async fn decide(&self, trigger: Trigger) -> Decision {
        let kind = trigger.kind();
        let decision = match self.state() {
            PolicyState::Disabled => Decision::allow(kind, format!("{kind} allowed: protection disabled")),
            PolicyState::Enabled { level, class } => {
                self.decide_enabled(level, class, trigger).await
            }
        };
        debug!("{}", decision.reason);
        self.publish(PolicyEvent::Decided(decision.clone()));
        decision
    }

    async fn decide_enabled(
        &self,
        level: EnforcementLevel,
        class: ProjectClass,
        trigger: Trigger,
    ) -> Decision {
        let kind = trigger.kind();
        let (tally, override_confirmed) = match trigger {
            Trigger::Save(path) => {
                let file = self.aggregator.context().normalize_path(&path);
                (Tally::from_issues(&self.editor.diagnostics_for(&file)), false)
            }
            Trigger::Commit { override_confirmed } => match self.aggregator.audit().await {
                Ok(report) => (Tally::from_report(&report), override_confirmed),
                Err(e) => return Decision::deny_unverified(kind, &e),
            },
            Trigger::Build => match self.counter.count().await {
                Ok(counts) if !counts.is_verified() => {
                    let tools = counts.unverified_tools();
                    let err = if tools.is_empty() {
                        GuardError::parse("a tool failed without reporting diagnostics")
                    } else {
                        GuardError::parse(format!(
                            "{} failed without reporting diagnostics",
                            tools.join(", ")
                        ))
                    };
                    return Decision::deny_unverified(kind, &err);
                }
                Ok(counts) => (Tally::from_counts(&counts), false),
                Err(e) => return Decision::deny_unverified(kind, &e),
            },
        };
        let verdict = judge(level, class, kind, &tally, override_confirmed);
        Decision::from_verdict(kind, verdict, tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::CheckContext;
    use crate::config::GuardConfig;
    use crate::diagnostics::InMemoryDiagnostics;
    use crate::issue::Severity;
    use crate::test_utils::ScriptedRunner;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::EnforcementLevel::{Advisory, ZeroTolerance};
    use super::ProjectClass::{Legacy, LegacyWithErrors, New, Unknown};
    use super::TriggerKind::{Build, Commit, Save};

    fn tally(errors: usize, warnings: usize, suppressions: usize) -> Tally {
        Tally {
            errors,
            warnings,
            suppressions,
            details: BTreeMap::new(),
        }
    }

    #[rstest]
    // Save: errors always block, warnings only under zero tolerance.
    #[case(Advisory, Legacy, Save, tally(0, 1, 0), true)]
    #[case(ZeroTolerance, Legacy, Save, tally(0, 1, 0), false)]
    #[case(Advisory, New, Save, tally(1, 0, 0), false)]
    #[case(Advisory, LegacyWithErrors, Save, tally(1, 0, 0), false)]
    // Build: same thresholds, class does not matter.
    #[case(Advisory, New, Build, tally(1, 0, 0), false)]
    #[case(Advisory, LegacyWithErrors, Build, tally(0, 5, 0), true)]
    #[case(ZeroTolerance, Legacy, Build, tally(0, 5, 0), false)]
    #[case(ZeroTolerance, New, Build, tally(0, 0, 3), true)]
    // Commit under zero tolerance counts suppressions.
    #[case(ZeroTolerance, Legacy, Commit, tally(0, 0, 1), false)]
    #[case(ZeroTolerance, New, Commit, tally(1, 0, 0), false)]
    #[case(ZeroTolerance, LegacyWithErrors, Commit, tally(0, 0, 0), true)]
    // Advisory commits: new projects always pass.
    #[case(Advisory, New, Commit, tally(9, 9, 9), true)]
    #[case(Advisory, Legacy, Commit, tally(1, 0, 0), false)]
    #[case(Advisory, Legacy, Commit, tally(0, 9, 9), true)]
    #[case(Advisory, LegacyWithErrors, Commit, tally(1, 0, 0), false)]
    #[case(Advisory, Unknown, Commit, tally(1, 0, 0), false)]
    fn test_judge_table(
        #[case] level: EnforcementLevel,
        #[case] class: ProjectClass,
        #[case] trigger: TriggerKind,
        #[case] counts: Tally,
        #[case] allowed: bool,
    ) {
        assert_eq!(judge(level, class, trigger, &counts, false).allowed, allowed);
    }

    #[rstest]
    #[case(LegacyWithErrors, true, true, OverrideStatus::Honored)]
    #[case(Unknown, true, true, OverrideStatus::Honored)]
    #[case(LegacyWithErrors, false, false, OverrideStatus::Available)]
    #[case(Legacy, true, false, OverrideStatus::Rejected)]
    fn test_advisory_commit_override(
        #[case] class: ProjectClass,
        #[case] confirmed: bool,
        #[case] allowed: bool,
        #[case] status: OverrideStatus,
    ) {
        let verdict = judge(Advisory, class, Commit, &tally(2, 0, 0), confirmed);
        assert_eq!(verdict.allowed, allowed);
        assert_eq!(verdict.override_status, status);
    }

    #[test]
    fn test_override_never_applies_under_zero_tolerance() {
        let verdict = judge(ZeroTolerance, LegacyWithErrors, Commit, &tally(3, 0, 0), true);
        assert!(!verdict.allowed);
        assert_eq!(verdict.override_status, OverrideStatus::Rejected);
        assert!(verdict.reason.contains("3 error(s)"));
    }

    #[test]
    fn test_reason_lists_sources() {
        let issues = vec![
            Issue::new(Source::TypeCheck, Severity::High, "a"),
            Issue::new(Source::Lint, Severity::Medium, "b"),
        ];
        let verdict = judge(ZeroTolerance, Legacy, Build, &Tally::from_issues(&issues), false);
        assert_eq!(
            verdict.reason,
            "Build blocked: 1 error(s), 1 warning(s) [type-check: 1 error(s), 0 warning(s); lint: 0 error(s), 1 warning(s)]"
        );
    }

    struct Fixture {
        policy: ProtectionPolicy,
        runner: Arc<ScriptedRunner>,
        editor: Arc<InMemoryDiagnostics>,
    }

    fn fixture(runner: ScriptedRunner, file_count: usize) -> Fixture {
        let runner = Arc::new(runner);
        let editor = Arc::new(InMemoryDiagnostics::new());
        let files = (0..file_count).map(|i| PathBuf::from(format!("/work/src/f{i}.ts"))).collect();
        let ctx = CheckContext::with_files("/work", GuardConfig::new(), runner.clone(), files);
        let counter = Arc::new(ErrorCounter::new(ctx.clone(), Some(editor.clone())));
        let aggregator = Arc::new(IssueAggregator::new(ctx));
        Fixture {
            policy: ProtectionPolicy::new(counter, aggregator, editor.clone()),
            runner,
            editor,
        }
    }

    const TSC_ERROR: &str = "src/a.ts(1,1): error TS2304: Cannot find name 'x'.\n";

    #[rstest]
    #[case::small_clean(ScriptedRunner::new(), 3, New)]
    #[case::large_clean(ScriptedRunner::new(), 50, Legacy)]
    #[case::has_errors(ScriptedRunner::new().respond("npx tsc", 2, TSC_ERROR, ""), 3, LegacyWithErrors)]
    #[case::suspicious(ScriptedRunner::new().respond("npx eslint", 2, "", "crash"), 3, Unknown)]
    #[tokio::test]
    async fn test_enable_classifies(
        #[case] runner: ScriptedRunner,
        #[case] files: usize,
        #[case] expected: ProjectClass,
    ) {
        let f = fixture(runner, files);
        let state = f.policy.enable(false).await;
        assert_eq!(
            state,
            PolicyState::Enabled {
                level: Advisory,
                class: expected
            }
        );
    }

    #[tokio::test]
    async fn test_disable_clears_classification_and_allows() {
        let f = fixture(ScriptedRunner::new(), 3);
        let mut events = f.policy.subscribe();
        f.policy.enable(true).await;
        f.policy.disable().await;
        assert_eq!(f.policy.state(), PolicyState::Disabled);

        let decision = f.policy.decide(Trigger::Build).await;
        assert!(decision.allowed);
        assert!(matches!(events.recv().await.unwrap(), PolicyEvent::Enabled { .. }));
        assert_eq!(events.recv().await.unwrap(), PolicyEvent::Disabled);
        assert!(matches!(events.recv().await.unwrap(), PolicyEvent::Decided(_)));
    }

    #[tokio::test]
    async fn test_save_reads_editor_diagnostics_without_spawning() {
        let f = fixture(ScriptedRunner::new(), 3);
        f.policy.enable(true).await;
        let spawned = f.runner.calls();

        f.editor.set(
            "src/a.ts",
            vec![Issue::new(Source::Lint, Severity::Medium, "warn").at("src/a.ts", 1, 1)],
        );
        let decision = f
            .policy
            .decide(Trigger::Save(PathBuf::from("/work/src/a.ts")))
            .await;
        assert!(!decision.allowed);
        assert_eq!(decision.warnings, 1);

        let other = f.policy.decide(Trigger::Save(PathBuf::from("src/b.ts"))).await;
        assert!(other.allowed);
        assert_eq!(f.runner.calls(), spawned);
    }

    #[tokio::test]
    async fn test_build_denies_when_counts_unavailable() {
        let ctx = CheckContext::with_files(
            "/work",
            GuardConfig::new(),
            Arc::new(ScriptedRunner::new().unavailable("npx tsc")),
            vec![],
        );
        let policy = ProtectionPolicy::new(
            Arc::new(ErrorCounter::new(ctx.clone(), None)),
            Arc::new(IssueAggregator::new(ctx)),
            Arc::new(InMemoryDiagnostics::new()),
        );
        policy.enable(false).await;
        assert_eq!(
            policy.state(),
            PolicyState::Enabled {
                level: Advisory,
                class: Unknown
            }
        );
        let decision = policy.decide(Trigger::Build).await;
        assert!(!decision.allowed);
        assert!(decision.reason.contains("could not verify"));
    }

    #[tokio::test]
    async fn test_build_denies_when_one_tool_crashed_and_the_other_only_warns() {
        let eslint = r#"[{"filePath": "src/a.ts", "messages": [
            {"ruleId": "no-console", "severity": 1, "message": "console", "line": 3, "column": 1}
        ]}]"#;
        let runner = ScriptedRunner::new()
            .respond("npx tsc", 2, "garbage", "")
            .respond("npx eslint", 1, eslint, "");
        let ctx = CheckContext::with_files("/work", GuardConfig::new(), Arc::new(runner), vec![]);
        let policy = ProtectionPolicy::new(
            Arc::new(ErrorCounter::new(ctx.clone(), None)),
            Arc::new(IssueAggregator::new(ctx)),
            Arc::new(InMemoryDiagnostics::new()),
        );
        policy.enable(false).await;
        assert_eq!(
            policy.state(),
            PolicyState::Enabled {
                level: Advisory,
                class: Unknown
            }
        );
        let decision = policy.decide(Trigger::Build).await;
        assert!(!decision.allowed);
        assert!(decision.reason.contains("type-check failed without reporting diagnostics"));
    }
}
