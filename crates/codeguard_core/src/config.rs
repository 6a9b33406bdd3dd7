//! codeguard configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};

use crate::GuardError;
use crate::score::ScoringWeights;
use crate::severity::SeverityMap;

// Embed the schema
const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/config.json");
static CONFIG_SCHEMA: OnceLock<Validator> = OnceLock::new();

/// Directories never scanned regardless of user configuration.
pub const ALWAYS_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "out",
    "coverage",
    ".git",
    "target",
];

/// The external tools codeguard shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    TypeCheck,
    Lint,
    Build,
    Syntax,
    DependencyAudit,
}

impl ToolKind {
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::TypeCheck => "type-check",
            ToolKind::Lint => "lint",
            ToolKind::Build => "build",
            ToolKind::Syntax => "syntax",
            ToolKind::DependencyAudit => "dependency-audit",
        }
    }

    /// Built-in invocation used when the config does not override it.
    pub fn default_spec(&self) -> ToolSpec {
        let (command, args, timeout_ms, enabled): (&str, &[&str], u64, bool) = match self {
            ToolKind::TypeCheck => ("npx", &["tsc", "--noEmit", "--pretty", "false"], 120_000, true),
            ToolKind::Lint => ("npx", &["eslint", ".", "--format", "json"], 60_000, true),
            ToolKind::Build => ("npm", &["run", "build", "--if-present"], 300_000, true),
            ToolKind::Syntax => ("", &[], 30_000, false),
            ToolKind::DependencyAudit => ("npm", &["audit", "--json"], 60_000, true),
        };
        ToolSpec {
            kind: *self,
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout: Duration::from_millis(timeout_ms),
            enabled,
        }
    }
}

/// Resolved invocation of one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub kind: ToolKind,
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub enabled: bool,
}

impl ToolSpec {
    /// Renders the invocation as a single shell-style line.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Per-tool overrides from the config file. Unset fields keep the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// The `tools` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    pub type_check: ToolOverride,
    pub lint: ToolOverride,
    pub build: ToolOverride,
    pub syntax: ToolOverride,
    pub dependency_audit: ToolOverride,
}

impl ToolsConfig {
    fn get(&self, kind: ToolKind) -> &ToolOverride {
        match kind {
            ToolKind::TypeCheck => &self.type_check,
            ToolKind::Lint => &self.lint,
            ToolKind::Build => &self.build,
            ToolKind::Syntax => &self.syntax,
            ToolKind::DependencyAudit => &self.dependency_audit,
        }
    }
}

/// Configuration for codeguard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardConfig {
    /// Start in zero-tolerance mode.
    #[serde(default)]
    pub strict: bool,

    /// File patterns scanned by the in-process checkers.
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// File patterns to exclude (in addition to [`ALWAYS_EXCLUDED_DIRS`]).
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub tools: ToolsConfig,

    /// Per-stream cap on captured tool output.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    #[serde(default)]
    pub severity: SeverityMap,

    #[serde(default)]
    pub scoring: ScoringWeights,

    /// Projects with fewer files than this are classified as new.
    #[serde(default = "default_new_project_file_threshold")]
    pub new_project_file_threshold: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Type checker configuration audited by the config checker.
    #[serde(default = "default_config_file")]
    pub config_file: String,

    /// Compiler options the config checker expects.
    #[serde(default = "default_expected_compiler_options")]
    pub expected_compiler_options: BTreeMap<String, serde_json::Value>,

    /// Section name for the `protection-mode` / `strict-mode` git config keys.
    #[serde(default = "default_git_config_prefix")]
    pub git_config_prefix: String,

    /// Directory containing the configuration file.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_include() -> Vec<String> {
    ["ts", "tsx", "js", "jsx", "mjs", "cjs"]
        .iter()
        .map(|ext| format!("**/*.{ext}"))
        .collect()
}

fn default_max_output_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_new_project_file_threshold() -> usize {
    20
}

fn default_poll_interval_ms() -> u64 {
    30_000
}

fn default_config_file() -> String {
    "tsconfig.json".to_string()
}

fn default_expected_compiler_options() -> BTreeMap<String, serde_json::Value> {
    BTreeMap::from([("strict".to_string(), serde_json::Value::Bool(true))])
}

fn default_git_config_prefix() -> String {
    "codeguard".to_string()
}

impl GuardConfig {
    /// Config file names, in discovery priority order.
    pub const CONFIG_FILES: &'static [&'static str] = &[".codeguard.jsonc", ".codeguard.json"];

    /// Creates a configuration with every default applied.
    pub fn new() -> Self {
        Self {
            strict: false,
            include: default_include(),
            exclude: Vec::new(),
            tools: ToolsConfig::default(),
            max_output_bytes: default_max_output_bytes(),
            severity: SeverityMap::default(),
            scoring: ScoringWeights::default(),
            new_project_file_threshold: default_new_project_file_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
            config_file: default_config_file(),
            expected_compiler_options: default_expected_compiler_options(),
            git_config_prefix: default_git_config_prefix(),
            base_dir: None,
        }
    }

    /// Searches `start` and its ancestors for a config file.
    pub fn discover(start: impl AsRef<Path>) -> Option<PathBuf> {
        start.as_ref().ancestors().find_map(|dir| {
            Self::CONFIG_FILES
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file())
        })
    }

    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GuardError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| GuardError::config(format!("Failed to read config: {}", e)))?;

        let mut config = Self::from_json(&content)?;

        if let Some(parent) = path.parent() {
            config.base_dir = Some(parent.to_path_buf());
        }

        Ok(config)
    }

    /// Parses configuration from JSON (comments allowed) with schema validation.
    pub fn from_json(json: &str) -> Result<Self, GuardError> {
        let value = jsonc_parser::parse_to_serde_value(json, &Default::default())
            .map_err(|e| GuardError::config(format!("Invalid JSON: {}", e)))?
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let schema = CONFIG_SCHEMA.get_or_init(|| {
            let schema_json: serde_json::Value =
                serde_json::from_str(SCHEMA_JSON).expect("Invalid embedded config schema");
            Validator::new(&schema_json).expect("Invalid config schema compilation")
        });

        if let Err(e) = schema.validate(&value) {
            let error_msg = format!("{} at {}", e, e.instance_path());
            return Err(GuardError::config(format!(
                "Config validation failed: {}",
                error_msg
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| GuardError::config(format!("Invalid config: {}", e)))
    }

    /// Resolves the effective invocation of a tool.
    pub fn tool(&self, kind: ToolKind) -> ToolSpec {
        let mut spec = kind.default_spec();
        let over = self.tools.get(kind);
        if let Some(command) = &over.command {
            spec.command = command.clone();
            // A custom syntax command implies the tool is wanted.
            if kind == ToolKind::Syntax && over.enabled.is_none() {
                spec.enabled = !command.trim().is_empty();
            }
        }
        if let Some(args) = &over.args {
            spec.args = args.clone();
        }
        if let Some(ms) = over.timeout_ms {
            spec.timeout = Duration::from_millis(ms);
        }
        if let Some(enabled) = over.enabled {
            spec.enabled = enabled;
        }
        if spec.command.trim().is_empty() {
            spec.enabled = false;
        }
        spec
    }

    /// Interval between background error counts.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_config_new() {
        let config = GuardConfig::new();
        assert!(!config.strict);
        assert!(config.include.iter().any(|p| p == "**/*.ts"));
        assert!(config.exclude.is_empty());
        assert_eq!(config.new_project_file_threshold, 20);
    }

    #[test]
    fn test_config_from_json_with_comments() {
        let json = r#"{
            // zero tolerance for this repo
            "strict": true,
            "tools": {
                "lint": { "timeoutMs": 5000 },
                "build": { "enabled": false }
            }
        }"#;

        let config = GuardConfig::from_json(json).unwrap();
        assert!(config.strict);
        let lint = config.tool(ToolKind::Lint);
        assert_eq!(lint.timeout, Duration::from_millis(5000));
        assert_eq!(lint.command, "npx");
        assert!(!config.tool(ToolKind::Build).enabled);
    }

    #[test]
    fn test_syntax_tool_disabled_until_configured() {
        let config = GuardConfig::new();
        assert!(!config.tool(ToolKind::Syntax).enabled);

        let config = GuardConfig::from_json(
            r#"{ "tools": { "syntax": { "command": "node", "args": ["--check"] } } }"#,
        )
        .unwrap();
        let syntax = config.tool(ToolKind::Syntax);
        assert!(syntax.enabled);
        assert_eq!(syntax.command_line(), "node --check");
    }

    #[test]
    fn test_default_tool_timeouts_are_tool_specific() {
        let config = GuardConfig::new();
        assert!(config.tool(ToolKind::Build).timeout > config.tool(ToolKind::Lint).timeout);
        assert!(config.tool(ToolKind::TypeCheck).timeout > config.tool(ToolKind::Lint).timeout);
    }

    #[test]
    fn test_discover_walks_up() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("packages").join("app");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(".codeguard.json"), "{}").unwrap();

        let found = GuardConfig::discover(&nested).unwrap();
        assert_eq!(found, dir.path().join(".codeguard.json"));
    }

    #[test]
    fn test_from_file_sets_base_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".codeguard.jsonc");
        fs::write(&path, r#"{ "newProjectFileThreshold": 5 }"#).unwrap();

        let config = GuardConfig::from_file(&path).unwrap();
        assert_eq!(config.new_project_file_threshold, 5);
        assert_eq!(config.base_dir.as_deref(), Some(dir.path()));
    }

    use rstest::rstest;

    #[rstest]
    #[case::unknown_property(r#"{ "strictt": true }"#, "Config validation failed")]
    #[case::type_mismatch(r#"{ "strict": "yes" }"#, "Config validation failed")]
    #[case::invalid_severity(
        r#"{ "severity": { "lintError": "catastrophic" } }"#,
        "Config validation failed"
    )]
    #[case::malformed(r#"{ "strict": "#, "Invalid JSON")]
    fn test_config_validation_errors(#[case] json: &str, #[case] expected_error_part: &str) {
        let result = GuardConfig::from_json(json);
        assert!(result.is_err(), "Expected error for JSON: {}", json);
        let err = result.unwrap_err();
        assert!(
            err.to_string().contains(expected_error_part),
            "Error message '{}' should contain '{}'",
            err,
            expected_error_part
        );
    }
}
