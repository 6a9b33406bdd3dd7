use async_trait::async_trait;
use rayon::prelude::*;

use super::build::parse_build_output;
use super::{CheckContext, CheckOutcome, Checker, read_source};
use crate::config::ToolKind;
use crate::error::GuardError;
use crate::issue::{Issue, Source};

const CONFLICT_START: &str = "<<<<<<<";

/// Returns the 1-based line of every unresolved merge conflict block.
pub fn find_conflict_markers(text: &str) -> Vec<u32> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            line.strip_prefix(CONFLICT_START)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
        })
        .map(|(i, _)| i as u32 + 1)
        .collect()
}

fn scan_files(ctx: &CheckContext) -> Vec<Issue> {
    let map = &ctx.config.severity;
    let mut issues: Vec<Issue> = ctx
        .files
        .par_iter()
        .flat_map_iter(|path| {
            let lines = read_source(path)
                .map(|text| find_conflict_markers(&text))
                .unwrap_or_default();
            let file = ctx.normalize_path(path);
            lines.into_iter().map(move |line| {
                Issue::new(Source::Syntax, map.merge_conflict, "Unresolved merge conflict marker")
                    .at(file.clone(), line, 1)
                    .with_code("merge-conflict")
                    .with_fix("Resolve the conflict and remove the markers")
            })
        })
        .collect();
    issues.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
    issues
}

/// Scans sources for unresolved merge conflicts and runs the configured
/// syntax tool, if any.
pub struct SyntaxChecker;

#[async_trait]
impl Checker for SyntaxChecker {
    fn name(&self) -> &'static str {
        ToolKind::Syntax.name()
    }

    fn source(&self) -> Source {
        Source::Syntax
    }

    async fn check(&self, ctx: &CheckContext) -> Result<CheckOutcome, GuardError> {
        let scan_ctx = ctx.clone();
        let markers = tokio::task::spawn_blocking(move || scan_files(&scan_ctx))
            .await
            .map_err(|e| GuardError::Internal(format!("syntax scan failed: {}", e)))?;

        let spec = ctx.config.tool(ToolKind::Syntax);
        if !spec.enabled {
            return Ok(CheckOutcome {
                issues: markers,
                ..Default::default()
            });
        }

        let output = ctx.run_tool(&spec).await?;
        let mut outcome = CheckOutcome::from_output(self.name(), &output);
        let text = format!("{}\n{}", output.stdout, output.stderr);
        outcome.issues = parse_build_output(
            &text,
            !output.success(),
            Source::Syntax,
            &ctx.root,
            &ctx.config.severity,
        );
        outcome.flag_silent_failure(Source::Syntax, self.name(), &ctx.config.severity);
        outcome.issues.extend(markers);
        Ok(outcome)
    }
}
