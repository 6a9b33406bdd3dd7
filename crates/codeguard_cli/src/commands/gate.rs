//! Gate command implementation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codeguard_core::{
    ErrorCounter, InMemoryDiagnostics, Issue, IssueAggregator, ProtectionPolicy, Trigger,
};
use miette::{IntoDiagnostic, Result, miette};
use tracing::{debug, info};

use crate::cli::{Cli, GateTrigger, OutputFormat};
use crate::output::output_decision;
use crate::utils::{check_context, create_tokio_runtime};

/// Returns `true` when the gate denied.
pub fn run_gate(
    cli: &Cli,
    trigger: GateTrigger,
    file: Option<&Path>,
    diagnostics: Option<&Path>,
    strict: bool,
    confirm_override: bool,
    format: OutputFormat,
) -> Result<bool> {
    let (ctx, config) = check_context(cli)?;
    let strict = strict || config.strict;

    let editor = Arc::new(InMemoryDiagnostics::new());
    if let Some(path) = diagnostics {
        let loaded = load_diagnostics(path)?;
        debug!("Loaded diagnostics for {} file(s)", loaded.len());
        for (file, issues) in loaded {
            editor.set(ctx.normalize_path(&file), issues);
        }
    }

    let trigger = match trigger {
        GateTrigger::Save => {
            let file = file.ok_or_else(|| miette!("--file is required for the save gate"))?;
            Trigger::Save(file.to_path_buf())
        }
        GateTrigger::Commit => Trigger::Commit {
            override_confirmed: confirm_override,
        },
        GateTrigger::Build => Trigger::Build,
    };

    let counter = Arc::new(ErrorCounter::new(ctx.clone(), Some(editor.clone())));
    let aggregator = Arc::new(IssueAggregator::new(ctx));
    let policy = ProtectionPolicy::new(counter, aggregator, editor);

    let runtime = create_tokio_runtime()?;
    let decision = runtime.block_on(async {
        let state = policy.enable(strict).await;
        info!("Policy {:?}", state);
        policy.decide(trigger).await
    });

    output_decision(&decision, format)?;
    Ok(!decision.allowed)
}

/// Reads a JSON array of issues and groups it by file.
fn load_diagnostics(path: &Path) -> Result<BTreeMap<PathBuf, Vec<Issue>>> {
    let text = std::fs::read_to_string(path).into_diagnostic()?;
    let issues: Vec<Issue> = serde_json::from_str(&text).into_diagnostic()?;
    let mut by_file: BTreeMap<PathBuf, Vec<Issue>> = BTreeMap::new();
    for issue in issues {
        by_file.entry(issue.file.clone()).or_default().push(issue);
    }
    Ok(by_file)
}
