//! External process execution with time and output bounds.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::GuardError;

/// Bounds for one process invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub cwd: PathBuf,
    pub timeout: Duration,
    /// Cap applied to stdout and stderr independently.
    pub max_output_bytes: usize,
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the process was ended by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// True when either stream hit `max_output_bytes`.
    pub truncated: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands.
///
/// A non-zero exit is a normal `Ok` result. Only an unspawnable binary
/// ([`GuardError::ToolUnavailable`]) or an exceeded time bound
/// ([`GuardError::ToolTimeout`]) are errors.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        options: &RunOptions,
    ) -> Result<ProcessOutput, GuardError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        options: &RunOptions,
    ) -> Result<ProcessOutput, GuardError> {
        debug!("Running {} {:?} in {}", program, args, options.cwd.display());

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&options.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GuardError::tool_unavailable(program, e.to_string()))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let cap = options.max_output_bytes;

        let finished = tokio::time::timeout(options.timeout, async {
            tokio::join!(
                read_capped(stdout, cap),
                read_capped(stderr, cap),
                child.wait()
            )
        })
        .await;

        let (stdout, stderr, status) = match finished {
            Ok(parts) => parts,
            Err(_) => {
                warn!(
                    "{} exceeded {}ms, killing it",
                    program,
                    options.timeout.as_millis()
                );
                if let Err(e) = child.start_kill() {
                    debug!("Failed to kill {}: {}", program, e);
                }
                return Err(GuardError::tool_timeout(program, options.timeout));
            }
        };

        let (stdout, out_truncated) = stdout?;
        let (stderr, err_truncated) = stderr?;
        let status = status?;

        let truncated = out_truncated || err_truncated;
        if truncated {
            warn!("Output of {} truncated at {} bytes", program, cap);
        }

        Ok(ProcessOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            truncated,
        })
    }
}

/// Reads a stream to the end, keeping at most `cap` bytes.
///
/// The remainder is drained and discarded so the child never blocks on a
/// full pipe.
async fn read_capped<R>(reader: Option<R>, cap: usize) -> io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok((Vec::new(), false));
    };

    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..n.min(room)]);
        if n > room {
            truncated = true;
        }
    }
    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn options(timeout_ms: u64, cap: usize) -> RunOptions {
        RunOptions {
            cwd: std::env::temp_dir(),
            timeout: Duration::from_millis(timeout_ms),
            max_output_bytes: cap,
        }
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let out = TokioProcessRunner
            .run("sh", &sh("echo oops >&2; exit 3"), &options(5_000, 1024))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_unavailable() {
        let err = TokioProcessRunner
            .run("codeguard-no-such-binary", &[], &options(5_000, 1024))
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::ToolUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let err = TokioProcessRunner
            .run("sh", &sh("sleep 5"), &options(100, 1024))
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::ToolTimeout { .. }));
    }

    #[tokio::test]
    async fn test_output_is_truncated_not_failed() {
        let out = TokioProcessRunner
            .run(
                "sh",
                &sh("i=0; while [ $i -lt 200 ]; do echo 0123456789; i=$((i+1)); done"),
                &options(5_000, 100),
            )
            .await
            .unwrap();
        assert!(out.truncated);
        assert_eq!(out.stdout.len(), 100);
        assert!(out.success());
    }
}
