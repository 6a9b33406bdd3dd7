//! Hook command implementation

use std::path::{Path, PathBuf};

use codeguard_core::{EnforcementLevel, HookScriptGenerator, default_hooks_dir, uninstall};
use miette::{IntoDiagnostic, Result};
use tracing::info;

use crate::cli::{Cli, HookKindArg};
use crate::utils::{load_config, project_root};

fn hooks_dir(cli: &Cli, hooks_dir: Option<&Path>) -> Result<PathBuf> {
    match hooks_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Ok(default_hooks_dir(&project_root(cli)?)),
    }
}

pub fn run_hook_install(
    cli: &Cli,
    kind: HookKindArg,
    strict: bool,
    dir: Option<&Path>,
) -> Result<()> {
    let config = load_config(cli)?;
    let generator = HookScriptGenerator::new(&config);
    let level = EnforcementLevel::from_strict(strict || config.strict);
    let path = generator
        .install(&hooks_dir(cli, dir)?, kind.into(), level)
        .into_diagnostic()?;
    println!("Installed {}", path.display());
    Ok(())
}

pub fn run_hook_uninstall(cli: &Cli, kind: HookKindArg, dir: Option<&Path>) -> Result<()> {
    let dir = hooks_dir(cli, dir)?;
    if uninstall(&dir, kind.into()).into_diagnostic()? {
        println!("Removed {} hook", codeguard_core::HookKind::from(kind).file_name());
    } else {
        info!("No codeguard hook to remove in {}", dir.display());
    }
    Ok(())
}

pub fn run_hook_print(cli: &Cli, kind: HookKindArg, strict: bool) -> Result<()> {
    let config = load_config(cli)?;
    let level = EnforcementLevel::from_strict(strict || config.strict);
    print!("{}", HookScriptGenerator::new(&config).generate(kind.into(), level));
    Ok(())
}
