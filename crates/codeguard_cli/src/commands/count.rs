//! Count command implementation

use codeguard_core::ErrorCounter;
use miette::{IntoDiagnostic, Result};

use crate::cli::{Cli, OutputFormat};
use crate::output::output_counts;
use crate::utils::{check_context, create_tokio_runtime};

/// Returns `true` when anything was counted or the counts are unverified.
pub fn run_count(cli: &Cli, format: OutputFormat) -> Result<bool> {
    let (ctx, _) = check_context(cli)?;
    let runtime = create_tokio_runtime()?;
    let counter = ErrorCounter::new(ctx, None);
    let counts = runtime.block_on(counter.count()).into_diagnostic()?;

    output_counts(&counts, format)?;
    Ok(!counts.is_clean())
}
