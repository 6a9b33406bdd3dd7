//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// codeguard - diagnostics aggregation and commit protection
#[derive(Parser)]
#[command(name = "codeguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every checker and report all issues
    Audit {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Also write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Count type-check and lint findings
    Count {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Decide whether a save, commit or build may proceed
    Gate {
        /// Lifecycle event to decide
        #[arg(value_enum)]
        trigger: GateTrigger,

        /// File being saved
        #[arg(long, required_if_eq("trigger", "save"))]
        file: Option<PathBuf>,

        /// JSON array of editor diagnostics consulted by the save gate
        #[arg(long)]
        diagnostics: Option<PathBuf>,

        /// Zero tolerance: warnings and unsafe suppressions also block
        #[arg(long)]
        strict: bool,

        /// Confirm the override offered for a blocked commit
        #[arg(long = "override")]
        confirm_override: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Manage git hooks
    Hook {
        #[command(subcommand)]
        command: HookCommands,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum HookCommands {
    /// Write the hook into the hooks directory
    Install {
        #[arg(long, value_enum)]
        kind: HookKindArg,

        /// Default to zero tolerance when strict-mode is unset
        #[arg(long)]
        strict: bool,

        /// Hooks directory (defaults to .git/hooks under the root)
        #[arg(long)]
        hooks_dir: Option<PathBuf>,
    },

    /// Remove a hook written by codeguard
    Uninstall {
        #[arg(long, value_enum)]
        kind: HookKindArg,

        #[arg(long)]
        hooks_dir: Option<PathBuf>,
    },

    /// Print the hook script
    Print {
        #[arg(long, value_enum)]
        kind: HookKindArg,

        #[arg(long)]
        strict: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GateTrigger {
    Save,
    Commit,
    Build,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HookKindArg {
    PreCommit,
    PrePush,
}

impl From<HookKindArg> for codeguard_core::HookKind {
    fn from(kind: HookKindArg) -> Self {
        match kind {
            HookKindArg::PreCommit => Self::PreCommit,
            HookKindArg::PrePush => Self::PrePush,
        }
    }
}
