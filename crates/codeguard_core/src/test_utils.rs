use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::GuardError;
use crate::process::{ProcessOutput, ProcessRunner, RunOptions};

#[derive(Clone)]
enum Scripted {
    Output(ProcessOutput),
    Unavailable,
    Timeout,
}

/// [`ProcessRunner`] answering from a table keyed by command-line prefix.
/// Unknown commands succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: HashMap<String, Scripted>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn respond(mut self, prefix: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.responses.insert(
            prefix.to_string(),
            Scripted::Output(ProcessOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                truncated: false,
            }),
        );
        self
    }

    pub fn unavailable(mut self, prefix: &str) -> Self {
        self.responses.insert(prefix.to_string(), Scripted::Unavailable);
        self
    }

    pub fn timeout(mut self, prefix: &str) -> Self {
        self.responses.insert(prefix.to_string(), Scripted::Timeout);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        options: &RunOptions,
    ) -> Result<ProcessOutput, GuardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        let scripted = self
            .responses
            .iter()
            .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, s)| s.clone());

        match scripted {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Unavailable) => Err(GuardError::tool_unavailable(program, "not found")),
            Some(Scripted::Timeout) => Err(GuardError::tool_timeout(program, options.timeout)),
            None => Ok(ProcessOutput::default()),
        }
    }
}
