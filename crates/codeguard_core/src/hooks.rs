//! Git hook scripts that enforce the policy outside the host process.
//!
//! A hook cannot call back into codeguard, so the generated script runs the
//! configured type-check and lint tools itself and applies the same
//! thresholds as [`judge`](crate::policy::judge). Project classification is
//! not available to a hook; advisory hooks block on errors only.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::GuardError;
use crate::checkers::flagged_suppression_pattern;
use crate::config::{GuardConfig, ToolKind, ToolSpec};
use crate::issue::Severity;
use crate::policy::EnforcementLevel;
use crate::severity::SeverityMap;

/// First comment line of every generated script.
pub const HOOK_MARKER: &str = "# codeguard-managed-hook";

/// Staged files scanned for suppressions.
const SCANNED_PATHSPECS: &[&str] = &["*.ts", "*.tsx", "*.js", "*.jsx", "*.mjs", "*.cjs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    PreCommit,
    PrePush,
}

impl HookKind {
    /// File name inside the hooks directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            HookKind::PreCommit => "pre-commit",
            HookKind::PrePush => "pre-push",
        }
    }

    fn action(&self) -> &'static str {
        match self {
            HookKind::PreCommit => "Commit",
            HookKind::PrePush => "Push",
        }
    }
}

/// Hooks directory of a repository rooted at `root`.
pub fn default_hooks_dir(root: &Path) -> PathBuf {
    root.join(".git").join("hooks")
}

/// One count the script derives from a tool's output, and the severity its
/// findings carry in-process.
struct Count {
    name: &'static str,
    expr: String,
    severity: Severity,
}

/// Renders hook scripts from a configuration.
pub struct HookScriptGenerator {
    prefix: String,
    type_check: ToolSpec,
    lint: ToolSpec,
    severity: SeverityMap,
}

impl HookScriptGenerator {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            prefix: config.git_config_prefix.clone(),
            type_check: config.tool(ToolKind::TypeCheck),
            lint: config.tool(ToolKind::Lint),
            severity: config.severity.clone(),
        }
    }

    /// Type checker diagnostics, one per matching output line.
    fn type_counts(&self) -> Vec<Count> {
        let lines_with = |token: &str| format!("$(occurrences \"$type_out\" '{token} TS[0-9]+')");
        vec![
            Count {
                name: "error",
                expr: lines_with("error"),
                severity: self.severity.type_error,
            },
            Count {
                name: "warning",
                expr: lines_with("warning"),
                severity: self.severity.type_warning,
            },
            Count {
                name: "info",
                expr: lines_with("message"),
                severity: self.severity.type_info,
            },
        ]
    }

    /// Linter findings from the per-file totals of its JSON report. The
    /// totals leave out `suppressedMessages`.
    fn lint_counts(&self) -> Vec<Count> {
        let total = |field: &str| format!("$(field_total \"$lint_out\" {field})");
        vec![
            Count {
                name: "fatal",
                expr: total("fatalErrorCount"),
                severity: self.severity.lint_fatal,
            },
            Count {
                name: "error",
                expr: format!("$(({} - lint_fatal))", total("errorCount")),
                severity: self.severity.lint_error,
            },
            Count {
                name: "warning",
                expr: total("warningCount"),
                severity: self.severity.lint_warning,
            },
        ]
    }

    /// Renders the script for `kind`. `level` is used when the repository
    /// does not set `<prefix>.strict-mode`.
    ///
    /// Equal inputs produce byte-identical output.
    pub fn generate(&self, kind: HookKind, level: EnforcementLevel) -> String {
        let mut script = Script::default();
        let prefix = &self.prefix;
        let default_strict = level == EnforcementLevel::ZeroTolerance;

        script.line("#!/bin/sh");
        script.line(HOOK_MARKER);
        script.line(format!(
            "# {} hook written by codeguard. Reinstall it instead of editing.",
            kind.file_name()
        ));
        script.blank();
        script.line(format!(
            "enabled=$(git config --bool {prefix}.protection-mode 2>/dev/null)"
        ));
        script.line("[ \"$enabled\" = \"true\" ] || exit 0");
        script.blank();
        script.line(format!(
            "strict=$(git config --bool {prefix}.strict-mode 2>/dev/null)"
        ));
        script.line(format!("[ -n \"$strict\" ] || strict={default_strict}"));
        script.blank();
        script.line("occurrences() {");
        script.line("    printf '%s\\n' \"$1\" | grep -o -E \"$2\" | wc -l | tr -d ' '");
        script.line("}");
        script.blank();
        script.line("field_total() {");
        script.line(
            r#"    printf '%s\n' "$1" | grep -o -E "\"$2\":[[:space:]]*[0-9]+" | sed 's/.*://' | awk '{ n += $1 } END { print n + 0 }'"#,
        );
        script.line("}");
        script.blank();

        self.tool_block(&mut script, "type", &self.type_check, self.type_counts());
        self.tool_block(&mut script, "lint", &self.lint, self.lint_counts());

        script.line("suppressions=0");
        if kind == HookKind::PreCommit {
            suppression_block(&mut script);
        }

        script.line("errors=$((type_errors + lint_errors))");
        script.line("warnings=$((type_warnings + lint_warnings))");
        script.line(
            "echo \"codeguard: type-check: $type_errors error(s), $type_warnings warning(s)\" >&2",
        );
        script.line("echo \"codeguard: lint: $lint_errors error(s), $lint_warnings warning(s)\" >&2");
        script.line("blocked=false");
        script.line("[ \"$errors\" -gt 0 ] && blocked=true");
        script.line(
            "[ \"$strict\" = \"true\" ] && [ $((warnings + suppressions)) -gt 0 ] && blocked=true",
        );
        script.line("if [ \"$blocked\" = \"true\" ]; then");
        let counts = match kind {
            HookKind::PreCommit => {
                "$errors error(s), $warnings warning(s), $suppressions unsafe suppression(s)"
            }
            HookKind::PrePush => "$errors error(s), $warnings warning(s)",
        };
        script.line(format!(
            "    echo \"{} blocked: {counts}\" >&2",
            kind.action()
        ));
        script.line("    exit 1");
        script.line("fi");
        script.line("exit 0");
        script.finish()
    }

    fn tool_block(&self, script: &mut Script, var: &str, spec: &ToolSpec, counts: Vec<Count>) {
        if !spec.enabled || spec.command.is_empty() {
            script.line(format!("{var}_errors=0"));
            script.line(format!("{var}_warnings=0"));
            script.blank();
            return;
        }
        let command = std::iter::once(&spec.command)
            .chain(&spec.args)
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ");
        let name = spec.kind.name();

        script.line(format!("{var}_out=$({command} 2>&1)"));
        script.line(format!("{var}_status=$?"));
        for count in &counts {
            script.line(format!("{var}_{}={}", count.name, count.expr));
        }
        let sum = |errors: bool| {
            let terms = counts
                .iter()
                .filter(|c| c.severity.is_error() == errors)
                .map(|c| format!("{var}_{}", c.name))
                .collect::<Vec<_>>();
            if terms.is_empty() {
                "0".to_string()
            } else {
                format!("$(({}))", terms.join(" + "))
            }
        };
        script.line(format!("{var}_errors={}", sum(true)));
        script.line(format!("{var}_warnings={}", sum(false)));
        script.line(format!(
            "if [ \"${var}_status\" -ne 0 ] && [ $((${var}_errors + ${var}_warnings)) -eq 0 ]; then"
        ));
        script.line(format!(
            "    echo \"codeguard: {name} failed without reporting diagnostics (exit ${var}_status)\" >&2"
        ));
        script.line(format!("    {var}_errors=1"));
        script.line("fi");
        script.blank();
    }

    /// Writes the hook for `kind` into `hooks_dir` with mode 0755.
    ///
    /// Replaces a previous codeguard hook; refuses to touch any other file.
    pub fn install(
        &self,
        hooks_dir: &Path,
        kind: HookKind,
        level: EnforcementLevel,
    ) -> Result<PathBuf, GuardError> {
        let path = hooks_dir.join(kind.file_name());
        if is_foreign(&path)? {
            return Err(GuardError::ForeignHook(path));
        }

        fs::create_dir_all(hooks_dir)?;
        fs::write(&path, self.generate(kind, level))?;
        set_executable(&path)?;
        info!("Installed {} hook at {}", kind.file_name(), path.display());
        Ok(path)
    }
}

/// Removes the hook for `kind` if codeguard wrote it.
///
/// Returns whether a file was removed. Foreign hooks are left in place.
pub fn uninstall(hooks_dir: &Path, kind: HookKind) -> Result<bool, GuardError> {
    let path = hooks_dir.join(kind.file_name());
    match fs::read_to_string(&path) {
        Ok(content) if is_managed(&content) => {
            fs::remove_file(&path)?;
            info!("Removed {} hook", kind.file_name());
            Ok(true)
        }
        Ok(_) => {
            debug!("{} is not a codeguard hook, leaving it", path.display());
            Ok(false)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn is_managed(content: &str) -> bool {
    content.lines().take(3).any(|line| line == HOOK_MARKER)
}

fn is_foreign(path: &Path) -> Result<bool, GuardError> {
    match fs::read(path) {
        Ok(bytes) => Ok(!is_managed(&String::from_utf8_lossy(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), GuardError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), GuardError> {
    Ok(())
}

fn suppression_block(script: &mut Script) {
    let pathspecs = SCANNED_PATHSPECS
        .iter()
        .map(|p| format!("'{p}'"))
        .collect::<Vec<_>>()
        .join(" ");
    script.line("if [ \"$strict\" = \"true\" ]; then");
    script.line(format!(
        "    staged=$(git diff --cached --name-only --diff-filter=ACM -- {pathspecs})"
    ));
    script.line("    while IFS= read -r file; do");
    script.line("        [ -n \"$file\" ] || continue");
    script.line(format!(
        "        found=$(git show \":$file\" 2>/dev/null | grep -c -E '{}')",
        flagged_suppression_pattern()
    ));
    script.line("        suppressions=$((suppressions + ${found:-0}))");
    script.line("    done <<EOF");
    script.line("$staged");
    script.line("EOF");
    script.line(
        "    echo \"codeguard: staged files: $suppressions unsafe suppression(s)\" >&2",
    );
    script.line("fi");
    script.blank();
}

/// Single-quotes `arg` unless it is made of shell-safe characters only.
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,@%+".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[derive(Default)]
struct Script {
    text: String,
}

impl Script {
    fn line(&mut self, line: impl AsRef<str>) {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }

    fn finish(self) -> String {
        self.text
    }
}
