//! Output formatting module

mod json;
mod text;

use codeguard_core::{AuditReport, Decision, ErrorCounts};
use miette::Result;

use crate::cli::OutputFormat;

pub fn output_report(report: &AuditReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => json::output_report(report),
        OutputFormat::Text => {
            text::output_report(report);
            Ok(())
        }
    }
}

pub fn output_counts(counts: &ErrorCounts, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => json::output_json(counts),
        OutputFormat::Text => {
            text::output_counts(counts);
            Ok(())
        }
    }
}

pub fn output_decision(decision: &Decision, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => json::output_json(decision),
        OutputFormat::Text => {
            text::output_decision(decision);
            Ok(())
        }
    }
}
