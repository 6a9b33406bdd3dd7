//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use codeguard_core::{GuardError, ProcessOutput, ProcessRunner, RunOptions};

/// Answers commands from a table keyed by the first argument after the
/// program (`tsc`, `eslint`, ...). Unknown commands succeed silently.
#[derive(Default)]
pub struct FakeTools {
    outputs: HashMap<&'static str, Result<ProcessOutput, &'static str>>,
    spawned: AtomicUsize,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(mut self, tool: &'static str, exit_code: i32, stdout: impl Into<String>) -> Self {
        self.outputs.insert(
            tool,
            Ok(ProcessOutput {
                exit_code,
                stdout: stdout.into(),
                ..Default::default()
            }),
        );
        self
    }

    pub fn missing(mut self, tool: &'static str) -> Self {
        self.outputs.insert(tool, Err("not installed"));
        self
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl ProcessRunner for FakeTools {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        _options: &RunOptions,
    ) -> Result<ProcessOutput, GuardError> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        let tool = args.first().map(String::as_str).unwrap_or(program);
        match self.outputs.get(tool) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(reason)) => Err(GuardError::tool_unavailable(tool, *reason)),
            None => Ok(ProcessOutput::default()),
        }
    }
}

/// `tsc --pretty false` output with `count` distinct errors in `src/app.ts`.
pub fn tsc_errors(count: usize) -> String {
    (1..=count)
        .map(|line| format!("src/app.ts({line},5): error TS2322: Type 'string' is not assignable to type 'number'.\n"))
        .collect()
}

/// ESLint JSON output for `src/app.ts` with the given error and warning counts.
pub fn eslint_json(errors: usize, warnings: usize) -> String {
    let messages: Vec<String> = (0..errors + warnings)
        .map(|i| {
            let (severity, rule) = if i < errors {
                (2, "no-undef")
            } else {
                (1, "no-unused-vars")
            };
            format!(
                r#"{{"ruleId":"{rule}","severity":{severity},"message":"finding {i}","line":{},"column":1}}"#,
                i + 1
            )
        })
        .collect();
    format!(
        r#"[{{"filePath":"src/app.ts","messages":[{}],"errorCount":{errors},"warningCount":{warnings}}}]"#,
        messages.join(",")
    )
}

/// Writes `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}
