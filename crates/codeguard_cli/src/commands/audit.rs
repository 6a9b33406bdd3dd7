//! Audit command implementation

use std::path::Path;

use codeguard_core::IssueAggregator;
use miette::{IntoDiagnostic, Result};
use tracing::info;

use crate::cli::{Cli, OutputFormat};
use crate::output::output_report;
use crate::utils::{check_context, create_tokio_runtime};

/// Returns `true` when the report did not pass.
pub fn run_audit(cli: &Cli, format: OutputFormat, output: Option<&Path>) -> Result<bool> {
    let (ctx, _) = check_context(cli)?;
    info!("Auditing {} file(s) under {}", ctx.files.len(), ctx.root.display());

    let runtime = create_tokio_runtime()?;
    let aggregator = IssueAggregator::new(ctx);
    let report = runtime.block_on(aggregator.audit()).into_diagnostic()?;

    if let Some(path) = output {
        report.write_json(path).into_diagnostic()?;
        info!("Report written to {}", path.display());
    }
    output_report(&report, format)?;
    Ok(!report.passed)
}
