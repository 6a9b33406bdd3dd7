use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use super::{CheckContext, CheckOutcome, Checker};
use crate::error::GuardError;
use crate::issue::{Issue, Source};
use crate::severity::SeverityMap;

/// Options implied by `"strict": true`.
const STRICT_FAMILY: &[&str] = &[
    "noImplicitAny",
    "strictNullChecks",
    "strictFunctionTypes",
    "strictBindCallApply",
    "strictPropertyInitialization",
    "noImplicitThis",
    "alwaysStrict",
    "useUnknownInCatchVariables",
];

fn invalid_file_issue(path: &Path, message: String, map: &SeverityMap) -> Issue {
    let err = GuardError::config_invalid(path, message);
    Issue::new(Source::Config, map.config_invalid, err.to_string())
        .at(path, 0, 0)
        .with_code("config-invalid")
        .with_fix("Fix the JSON syntax so the tools can read this file")
}

/// 1-based line of the first occurrence of `"key"`, or 0.
fn key_line(text: &str, key: &str) -> u32 {
    let needle = format!("\"{}\"", key);
    text.lines()
        .position(|line| line.contains(&needle))
        .map_or(0, |i| i as u32 + 1)
}

/// Compares `compilerOptions` against the expected values.
pub(crate) fn audit_compiler_options(
    path: &Path,
    text: &str,
    config: &Value,
    expected: &BTreeMap<String, Value>,
    map: &SeverityMap,
) -> Vec<Issue> {
    let options = config.get("compilerOptions");
    let get = |key: &str| options.and_then(|o| o.get(key));
    let strict = get("strict").and_then(Value::as_bool).unwrap_or(false);

    expected
        .iter()
        .filter(|(key, want)| {
            let actual = get(key.as_str());
            let implied = strict
                && actual.is_none()
                && *want == &Value::Bool(true)
                && STRICT_FAMILY.contains(&key.as_str());
            actual != Some(*want) && !implied
        })
        .map(|(key, want)| {
            let found = get(key.as_str()).map_or_else(|| "unset".to_string(), Value::to_string);
            Issue::new(
                Source::Config,
                map.config_mismatch,
                format!("compilerOptions.{} should be {} (found {})", key, want, found),
            )
            .at(path, key_line(text, key), 0)
            .with_code(format!("config:{}", key))
            .with_fix(format!(
                "Set \"{}\": {} under compilerOptions in {}",
                key,
                want,
                path.display()
            ))
        })
        .collect()
}

/// Audits the type checker configuration and the package manifest.
pub struct ConfigChecker;

#[async_trait]
impl Checker for ConfigChecker {
    fn name(&self) -> &'static str {
        "config-audit"
    }

    fn source(&self) -> Source {
        Source::Config
    }

    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, GuardError> {
        let map = &ctx.config.severity;
        let mut outcome = CheckOutcome::default();
        let mut audited = false;

        let config_path = Path::new(&ctx.config.config_file);
        if let Some(text) = read_if_present(&ctx.root.join(config_path)).await? {
            audited = true;
            match jsonc_parser::parse_to_serde_value(&text, &Default::default()) {
                Ok(value) => {
                    let value = value.unwrap_or(Value::Null);
                    outcome.issues.extend(audit_compiler_options(
                        config_path,
                        &text,
                        &value,
                        &ctx.config.expected_compiler_options,
                        map,
                    ));
                }
                Err(e) => outcome
                    .issues
                    .push(invalid_file_issue(config_path, e.to_string(), map)),
            }
        }

        let manifest = Path::new("package.json");
        if let Some(text) = read_if_present(&ctx.root.join(manifest)).await? {
            audited = true;
            if let Err(e) = serde_json::from_str::<Value>(&text) {
                outcome
                    .issues
                    .push(invalid_file_issue(manifest, e.to_string(), map));
            }
        }

        if !audited {
            return Ok(CheckOutcome::skipped("no configuration files"));
        }
        Ok(outcome)
    }
}

async fn read_if_present(path: &Path) -> Result<Option<String>, GuardError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
