//! CLI utility functions

use std::path::PathBuf;
use std::sync::Arc;

use codeguard_core::{CheckContext, GuardConfig, TokioProcessRunner};
use miette::{IntoDiagnostic, Result};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::cli::Cli;

pub fn create_tokio_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()
}

/// Project root: `--root`, or the current directory.
pub fn project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.root {
        Some(root) => Ok(root.clone()),
        None => std::env::current_dir().into_diagnostic(),
    }
}

/// Loads `--config`, or the first config file found upward from the root,
/// or the defaults.
pub fn load_config(cli: &Cli) -> Result<GuardConfig> {
    if let Some(path) = &cli.config {
        return GuardConfig::from_file(path).into_diagnostic();
    }
    let root = project_root(cli)?;
    match GuardConfig::discover(&root) {
        Some(path) => {
            debug!("Using config {}", path.display());
            GuardConfig::from_file(path).into_diagnostic()
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(GuardConfig::new())
        }
    }
}

/// Check context over the project on disk, running real tools.
pub fn check_context(cli: &Cli) -> Result<(CheckContext, GuardConfig)> {
    let config = load_config(cli)?;
    let root = project_root(cli)?;
    let ctx = CheckContext::new(root, config.clone(), Arc::new(TokioProcessRunner)).into_diagnostic()?;
    Ok((ctx, config))
}
